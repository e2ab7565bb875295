//! 配置模块，负责加载JSON配置文件

use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("无法读取配置文件 {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("无法解析JSON配置文件 {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// 过滤器配置，缺省字段使用默认值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// 分词前是否展开 `10GB`、`2h30m`、`1,000` 等人性化数值
    pub normalize_humanized: bool,
    /// 记录数达到该阈值时使用多个工作线程并行求值
    pub parallel_threshold: usize,
    /// 工作线程数，0 表示使用 CPU 可用并行度
    pub workers: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            normalize_humanized: true,
            parallel_threshold: 4096,
            workers: 0,
        }
    }
}

impl FilterConfig {
    /// 从JSON文件加载过滤器配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::NotFound { path: path_ref.to_path_buf() });
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.to_path_buf(),
            source,
        })?;

        // 解析JSON
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path_ref.to_path_buf(),
            source,
        })
    }

    /// 实际使用的工作线程数
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }

    /// 给定记录数时是否应当并行求值
    pub fn should_parallelize(&self, len: usize) -> bool {
        len >= self.parallel_threshold && self.worker_count() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("record_filter_{}_{name}", std::process::id()))
    }

    #[test]
    fn test_load_valid_json_config() {
        // 创建临时配置文件
        let temp_file = temp_path("valid.json");
        let mut file = fs::File::create(&temp_file).unwrap();
        writeln!(file, r#"{{
            "normalize_humanized": false,
            "workers": 3
        }}"#).unwrap();

        // 测试加载，未指定的字段使用默认值
        let config = FilterConfig::from_json_file(&temp_file).unwrap();
        assert!(!config.normalize_humanized);
        assert_eq!(config.workers, 3);
        assert_eq!(config.parallel_threshold, 4096);
        assert_eq!(config.worker_count(), 3);

        // 清理
        fs::remove_file(&temp_file).ok();
    }

    #[test]
    fn test_invalid_json_config() {
        let temp_file = temp_path("invalid.json");
        let mut file = fs::File::create(&temp_file).unwrap();
        writeln!(file, "invalid json").unwrap();

        let result = FilterConfig::from_json_file(&temp_file);
        assert!(matches!(result, Err(ConfigError::Json { .. })));

        // 清理
        fs::remove_file(&temp_file).ok();
    }

    #[test]
    fn test_missing_file() {
        let result = FilterConfig::from_json_file("non_existent_file.json");
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
        assert!(err.to_string().contains("non_existent_file.json"));
    }

    #[test]
    fn test_default_config() {
        let config = FilterConfig::default();
        assert!(config.normalize_humanized);
        assert_eq!(config.parallel_threshold, 4096);
        assert!(config.worker_count() >= 1);
        assert!(!config.should_parallelize(10));
    }
}
