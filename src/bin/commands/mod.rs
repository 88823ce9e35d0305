pub mod info_cmd;
pub mod query_cmd;
pub mod scan_cmd;
pub mod validate_cmd;

pub use info_cmd::cmd_info;
pub use query_cmd::cmd_query;
pub use scan_cmd::cmd_scan;
pub use validate_cmd::cmd_validate;
