pub mod erp_user;
pub mod invitation;
pub mod order;
pub mod party;
pub mod role;
pub mod task;
pub mod time_entry;
pub mod user;
pub mod webhook_log;

pub use erp_user::{ErpUser, ErpUserUpsert, ERP_USERS};
pub use invitation::{Invitation, InvitationStatus, INVITATIONS};
pub use order::{Order, OrderUpsert, ORDERS};
pub use party::{Party, PartyUpsert, PARTIES};
pub use role::{RoleDataScopeRow, RoleRow};
pub use task::{Task, TaskUpsert, TASKS};
pub use time_entry::{TimeEntry, TimeEntryUpsert, TIME_ENTRIES};
pub use user::{NewUser, User, UserChanges, UserStatus, USERS};
pub use webhook_log::{WebhookLog, WEBHOOK_LOGS};
