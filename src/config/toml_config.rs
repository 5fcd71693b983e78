use crate::utils::error::{Result, WorkshopError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 工作區設定檔名稱
pub const CONFIG_FILE: &str = "workshop.toml";

pub const GITHUB_DOMAIN: &str = "github.com";
pub const GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkshopConfig {
    pub workshop: WorkspaceConfig,
    pub remote: RemoteConfig,
    /// Domain to API base URL.
    pub hosts: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    pub manifest: String,
    pub cache_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub token: Option<String>,
    pub user_agent: String,
    pub concurrent_downloads: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            manifest: "workshop.json".to_string(),
            cache_dir: ".workshop/cache".to_string(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 500,
            token: None,
            user_agent: concat!("workshop/", env!("CARGO_PKG_VERSION")).to_string(),
            concurrent_downloads: 4,
        }
    }
}

impl WorkshopConfig {
    /// 讀取工作區根目錄下的 workshop.toml，不存在時使用預設值
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let path = root.as_ref().join(CONFIG_FILE);
        if !path.exists() {
            tracing::debug!(
                "⚙️  No {} in {}, using defaults",
                CONFIG_FILE,
                root.as_ref().display()
            );
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(WorkshopError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| WorkshopError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GITHUB_TOKEN})
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::LazyLock;

        static ENV_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env pattern compiles"));

        ENV_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    /// API base URL for a domain: configured, GitHub, or `https://<domain>/api/v3`.
    pub fn api_base(&self, domain: &str) -> String {
        if let Some(base) = self.hosts.get(domain) {
            return base.trim_end_matches('/').to_string();
        }
        if domain == GITHUB_DOMAIN {
            return GITHUB_API.to_string();
        }
        format!("https://{}/api/v3", domain)
    }

    /// Token with unresolved `${VAR}` placeholders treated as absent.
    pub fn token(&self) -> Option<&str> {
        self.remote
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.starts_with("${"))
    }

    pub fn manifest_path(&self, root: &Path) -> PathBuf {
        root.join(&self.workshop.manifest)
    }

    pub fn cache_path(&self, root: &Path) -> PathBuf {
        let dir = Path::new(&self.workshop.cache_dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            root.join(dir)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.remote.retry_delay_ms)
    }
}

impl Validate for WorkshopConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("workshop.manifest", &self.workshop.manifest)?;
        validation::validate_path("workshop.cache_dir", &self.workshop.cache_dir)?;
        validation::validate_range("remote.timeout_seconds", self.remote.timeout_seconds, 1, 3600)?;
        validation::validate_positive_number(
            "remote.retry_attempts",
            self.remote.retry_attempts as usize,
            1,
        )?;
        validation::validate_positive_number(
            "remote.concurrent_downloads",
            self.remote.concurrent_downloads,
            1,
        )?;
        for (domain, base) in &self.hosts {
            validation::validate_url(&format!("hosts.{}", domain), base)?;
        }
        Ok(())
    }
}
