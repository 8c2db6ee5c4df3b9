//! Background estimation and removal

mod rolling_ball;

pub use rolling_ball::{
    background_of_plane, subtract_background, BackgroundSubtract, BackgroundSubtractParams,
    RollingBall,
};
