// ==========================================
// WareWise 仓库异常检测 - API 层错误类型
// ==========================================
// 职责: 定义 API 层错误类型，将仓储/引擎/导入错误转换为用户可读的消息
// 红线: 所有错误信息必须包含显式原因
// ==========================================

use crate::engine::error::EngineError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API 层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("模板无效: {0}")]
    InvalidTemplate(String),

    #[error("规则配置错误: {0}")]
    RuleConfigurationError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("库存导入失败: {0}")]
    ImportError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::ValidationError(format!("{}: {}", field, message))
            }
            RepositoryError::SerializationError(msg) => {
                ApiError::InternalError(format!("序列化失败: {}", msg))
            }
            RepositoryError::Other(e) => ApiError::Other(e),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            EngineError::InvalidTemplate { template_id, errors } => ApiError::InvalidTemplate(
                format!("template_id={}: {}", template_id, errors.join("; ")),
            ),
            e @ EngineError::InvalidRuleConditions { .. } => {
                ApiError::RuleConfigurationError(e.to_string())
            }
            e @ EngineError::EvaluatorNotFound(_) => {
                ApiError::RuleConfigurationError(e.to_string())
            }
            e @ EngineError::PatternCompileError { .. } => {
                ApiError::RuleConfigurationError(e.to_string())
            }
            EngineError::TemplateStoreError(msg) => ApiError::DatabaseError(msg),
            EngineError::LockError(msg) => ApiError::InternalError(format!("锁获取失败: {}", msg)),
            EngineError::InternalError(msg) => ApiError::InternalError(msg),
            EngineError::Other(e) => ApiError::Other(e),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::FileNotFound(path) => ApiError::NotFound(format!("文件 {}", path)),
            ImportError::MissingColumns(_) | ImportError::EmptyInventory => {
                ApiError::ValidationError(err.to_string())
            }
            ImportError::Other(e) => ApiError::Other(e),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

/// API 层 Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_conversion_keeps_entity_and_id() {
        let err: ApiError = RepositoryError::NotFound {
            entity: "Rule".to_string(),
            id: "42".to_string(),
        }
        .into();
        match err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("Rule"));
                assert!(msg.contains("42"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_engine_condition_error_maps_to_rule_configuration() {
        let err: ApiError = EngineError::InvalidRuleConditions {
            rule_name: "Forgotten Pallets Alert".to_string(),
            message: "time_threshold_hours 必须为数字".to_string(),
        }
        .into();
        assert!(matches!(err, ApiError::RuleConfigurationError(_)));
        assert!(err.to_string().contains("Forgotten Pallets Alert"));
    }

    #[test]
    fn test_missing_columns_maps_to_validation_error() {
        let err: ApiError = ImportError::MissingColumns(vec!["pallet_id".to_string()]).into();
        assert!(matches!(err, ApiError::ValidationError(_)));
        assert!(err.to_string().contains("pallet_id"));
    }
}
