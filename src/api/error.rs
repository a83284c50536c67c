// ==========================================
// 采购阶段跟踪系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换仓储/引擎错误为调用方可理解的错误
// 分类: Forbidden / NotFound / InvalidState / BadRequest (+ 并发与数据访问错误)
// ==========================================

use crate::engine::deadline::DeadlineOverflow;
use crate::engine::transition::TransitionError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 调用方错误
    // ==========================================
    #[error("无权操作: {0}")]
    Forbidden(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("状态无效: {0}")]
    InvalidState(String),

    /// 校验失败; missing 列出缺失的必备文档 (可为空)
    #[error("请求无效: {message}")]
    BadRequest { message: String, missing: Vec<String> },

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("乐观锁冲突: {0}")]
    OptimisticLockFailure(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("配置读取失败: {0}")]
    ConfigError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            missing: Vec::new(),
        }
    }

    /// 缺失文档列表 (仅 BadRequest 携带)
    pub fn missing_documents(&self) -> &[String] {
        match self {
            ApiError::BadRequest { missing, .. } => missing,
            _ => &[],
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure {
                record_id,
                expected,
                actual,
            } => ApiError::OptimisticLockFailure(format!(
                "记录{}已被其他用户修改（期望revision={}，实际revision={}）",
                record_id, expected, actual
            )),
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::InvalidState(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::bad_request(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::DatabaseError(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 TransitionError 转换
// ==========================================
impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Forbidden(msg) => ApiError::Forbidden(msg),
            TransitionError::InvalidState(msg) => ApiError::InvalidState(msg),
            TransitionError::BadRequest { message, missing } => {
                ApiError::BadRequest { message, missing }
            }
        }
    }
}

impl From<DeadlineOverflow> for ApiError {
    fn from(err: DeadlineOverflow) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<Box<dyn std::error::Error>> for ApiError {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_conversion() {
        let api_err: ApiError = RepositoryError::NotFound {
            entity: "TrackingRecord".to_string(),
            id: "R001".to_string(),
        }
        .into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("TrackingRecord"));
                assert!(msg.contains("R001"));
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }

        let api_err: ApiError = RepositoryError::OptimisticLockFailure {
            record_id: "R001".to_string(),
            expected: 1,
            actual: 2,
        }
        .into();
        match api_err {
            ApiError::OptimisticLockFailure(msg) => {
                assert!(msg.contains("R001"));
                assert!(msg.contains("已被其他用户修改"));
            }
            other => panic!("Expected OptimisticLockFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_transition_error_keeps_missing_list() {
        let api_err: ApiError = TransitionError::BadRequest {
            message: "文档不完整".to_string(),
            missing: vec!["Factura".to_string()],
        }
        .into();
        assert_eq!(api_err.missing_documents(), ["Factura".to_string()]);

        let api_err: ApiError = TransitionError::Forbidden("no".to_string()).into();
        assert!(matches!(api_err, ApiError::Forbidden(_)));
        assert!(api_err.missing_documents().is_empty());
    }

    #[test]
    fn test_deadline_overflow_is_bad_request() {
        let api_err: ApiError = DeadlineOverflow {
            sku: "SKU-1".to_string(),
            stage: crate::domain::stage::Stage::Discounted,
        }
        .into();
        match api_err {
            ApiError::BadRequest { message, missing } => {
                assert!(message.contains("SKU-1"));
                assert!(missing.is_empty());
            }
            other => panic!("Expected BadRequest, got {:?}", other),
        }
    }
}
