use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// 未指定 `--config` 时尝试加载的配置文件
pub const DEFAULT_CONFIG_FILE: &str = "investigator.toml";

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "anthropic")]
    #[default]
    Anthropic,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "openrouter" => Ok(LLMProvider::OpenRouter),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// 网页检索配置
    pub search: SearchConfig,

    /// 检索规划配置
    pub planner: PlannerConfig,

    /// 本地证据库配置
    pub store: StoreConfig,

    /// LLM模型配置
    pub llm: LLMConfig,

    /// 评分策略配置
    pub scoring: ScoringConfig,

    /// 提前终止关键词配置
    pub termination: TerminationConfig,

    /// 缓存配置
    pub cache: CacheConfig,

    /// 批量运行配置
    pub run: RunConfig,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// 网页检索配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    /// 检索服务 API KEY
    pub api_key: String,

    /// 检索服务地址
    pub api_base_url: String,

    /// 检索深度（basic / advanced）
    pub search_depth: String,

    /// 单次检索超时时间（秒）
    pub timeout_seconds: u64,

    /// 同一层级内的并发检索数
    pub workers: usize,
}

/// 检索规划配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PlannerConfig {
    /// 单条线索的检索任务上限
    pub budget: usize,

    /// CRITICAL 层单次检索的结果数
    pub critical_max_results: usize,

    /// 其余层单次检索的结果数
    pub max_results: usize,

    /// 标题检索取前几个词
    pub headline_words: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite 库文件路径
    pub database_path: PathBuf,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址，为空时使用各 Provider 的默认地址
    pub api_base_url: String,

    /// 评分使用的模型
    pub model: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,

    /// 超时时间（秒）
    pub timeout_seconds: u64,
}

/// 评分策略配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ScoringConfig {
    /// 自定义评分细则文件，缺省使用内置细则
    pub rubric_path: Option<PathBuf>,

    /// 未记录欺诈时的分数上限
    pub fraud_cap: u8,

    /// 未记录联邦项目参与时的分数上限
    pub federal_cap: u8,

    /// 写入提示词的网页结果数上限
    pub max_web_results: usize,

    /// 每条网页结果的摘录长度（字符）
    pub snippet_chars: usize,
}

/// 证据信号关键词配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TerminationConfig {
    pub copyright_markers: Vec<String>,
    pub retraction_markers: Vec<String>,
    pub settlement_markers: Vec<String>,
    pub fraud_markers: Vec<String>,
    pub federal_markers: Vec<String>,

    /// 判断"近期和解"时使用的年份，缺省取本地时钟年份
    pub reference_year: Option<i32>,
}

/// 缓存配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// 是否启用磁盘缓存
    pub enabled: bool,

    /// 缓存目录
    pub cache_dir: PathBuf,

    /// 缓存过期时间（小时）
    pub expire_hours: u64,
}

/// 批量运行配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RunConfig {
    /// 同时进行的调查数
    pub max_concurrent_investigations: usize,

    /// 结果数据集路径（JSONL）
    pub output_path: PathBuf,

    /// 进入完整调查所需的最低启发式分数
    pub min_heuristic_score: Option<f64>,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 显式路径优先，其次是当前目录下的默认配置文件，都没有则使用默认值
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// 当前参考年份
    pub fn reference_year(&self) -> i32 {
        self.termination.reference_year.unwrap_or_else(|| {
            use chrono::Datelike;
            chrono::Local::now().year()
        })
    }

    /// 未设置 RUST_LOG 时使用的日志级别
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("TAVILY_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api.tavily.com/search"),
            search_depth: String::from("advanced"),
            timeout_seconds: 30,
            workers: 4,
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            budget: 12,
            critical_max_results: 3,
            max_results: 5,
            headline_words: 4,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/fraud_data.db"),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: std::env::var("INVESTIGATOR_LLM_API_KEY").unwrap_or_default(),
            api_base_url: String::new(),
            model: String::from("claude-sonnet-4-20250514"),
            max_tokens: 3000,
            temperature: 0.1,
            timeout_seconds: 90,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            rubric_path: None,
            fraud_cap: 40,
            federal_cap: 30,
            max_web_results: 30,
            snippet_chars: 500,
        }
    }
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            copyright_markers: strings(&["copyright", "permission", "license", "licensing fee"]),
            retraction_markers: strings(&["retract", "withdrawn", "withdrawal"]),
            settlement_markers: strings(&["settlement", "settled", "agreed to pay"]),
            fraud_markers: strings(&[
                "fraud",
                "fabricat",
                "falsif",
                "misconduct",
                "false claims",
                "indict",
            ]),
            federal_markers: strings(&[
                "nih",
                "national institutes of health",
                "medicare",
                "medicaid",
                "federal grant",
                "federal funding",
                "reporter.nih.gov",
            ]),
            reference_year: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: PathBuf::from(".investigator/cache"),
            expire_hours: 168,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_concurrent_investigations: 2,
            output_path: PathBuf::from("data/results/investigations.jsonl"),
            min_heuristic_score: None,
        }
    }
}
