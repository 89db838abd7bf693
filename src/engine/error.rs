// ==========================================
// WareWise 仓库异常检测 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 输入错误 =====
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("模板无效 (template_id={template_id}): {}", .errors.join("; "))]
    InvalidTemplate {
        template_id: String,
        errors: Vec<String>,
    },

    // ===== 规则错误 =====
    #[error("规则条件错误 (rule={rule_name}): {message}")]
    InvalidRuleConditions { rule_name: String, message: String },

    #[error("未注册的规则评估器: {0}")]
    EvaluatorNotFound(String),

    #[error("正则编译失败 (pattern={pattern}): {message}")]
    PatternCompileError { pattern: String, message: String },

    // ===== 数据源错误 =====
    #[error("模板存储访问失败: {0}")]
    TemplateStoreError(String),

    #[error("锁获取失败: {0}")]
    LockError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<regex::Error> for EngineError {
    fn from(err: regex::Error) -> Self {
        EngineError::PatternCompileError {
            pattern: String::new(),
            message: err.to_string(),
        }
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
