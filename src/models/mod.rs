mod user;

pub use user::{
    LoginDto, NewUser, RegisterDto, Session, UpdatePasswordDto, UpdateProfileDto, User,
    UserResponseDto,
};
