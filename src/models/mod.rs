pub mod internal;

// Persisted rows are used directly as domain records.
pub use crate::storage::entities::api_keys::Model as ApiKey;
pub use crate::storage::entities::api_usage::Model as ApiUsage;
pub use crate::storage::entities::conversations::Model as Conversation;
pub use crate::storage::entities::error_logs::Model as ErrorLog;
pub use crate::storage::entities::global_instructions::Model as GlobalInstruction;
pub use crate::storage::entities::messages::Model as Message;
pub use crate::storage::entities::project_instructions::Model as ProjectInstruction;
pub use crate::storage::entities::project_memory::Model as ProjectMemoryItem;
pub use crate::storage::entities::projects::Model as Project;
pub use crate::storage::entities::query_logs::Model as QueryLog;
pub use crate::storage::entities::users::Model as User;
