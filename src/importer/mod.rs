// ==========================================
// 批量导入引擎 - 导入层
// ==========================================
// 职责: 将一批待插入数据组装为一条多行 INSERT 并回写结果
// 流程: 规范化 → 主键注入 → 冲突展开 → 时间戳 → 校验 → 执行 → 回写 → 级联
// ==========================================

// 模块声明
pub mod association_cascade;
pub mod bulk_importer;
pub mod duplicate_key_resolver;
pub mod error;
pub mod input_normalizer;
pub mod key_injector;
pub mod statement_builder;
pub mod synchronizer;
pub mod timestamp_stamper;
pub mod validation;

// 重导出核心类型
pub use association_cascade::{AssociationCollector, CascadeSummary, GroupKey};
pub use bulk_importer::BulkImporter;
pub use duplicate_key_resolver::DuplicateKeyResolver;
pub use error::{ConfigError, ImportError, ImportOutcome, InvalidRecord};
pub use input_normalizer::{ImportInput, InputForm, InputNormalizer, NormalizedBatch};
pub use key_injector::KeyInjector;
pub use statement_builder::{ExecutedBatch, StatementBuilder};
pub use synchronizer::Synchronizer;
pub use timestamp_stamper::TimestampStamper;
pub use validation::{KeptRow, RowOutcome, ValidatedRows, ValidationPipeline};
