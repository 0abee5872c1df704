pub mod footer;
pub mod header;
pub mod utils;

pub use footer::draw_footer;
pub use header::draw_header;
pub use utils::{intensity_color, local_time, opt_value, signup_status_color, truncate};
