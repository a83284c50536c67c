// ==========================================
// 采购阶段跟踪系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎, 不拼 SQL
// 红线: 引擎无状态, 时间由调用方传入
// ==========================================

pub mod authorization;
pub mod criticality;
pub mod deadline;
pub mod document_gate;
pub mod reconciler;
pub mod transition;

// 重导出核心引擎
pub use authorization::{authorize, TrackingOperation};
pub use criticality::{CriticalityAssessment, CriticalityEngine};
pub use deadline::{DeadlineCalculator, DeadlineOverflow};
pub use document_gate::{DocumentGate, JUSTIFICATION_REQUIRED};
pub use reconciler::{ReconcileAction, SyncReconciler};
pub use transition::{
    AdvanceRequest, StageTransitionEngine, TransitionError, TransitionOutcome, TransitionResult,
    DEFAULT_REJECTION_REASON_MIN_LEN,
};
