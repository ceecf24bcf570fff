mod user;

pub use user::{
    change_password_handler, login_handler, logout_handler, me_handler, register_handler,
    update_profile_handler,
};
