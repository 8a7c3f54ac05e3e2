// Discord commands module.
// Each feature gets its own command file.

pub mod imaging;

pub mod presence;

pub mod setsuna;

use crate::discord::{Data, Error};

/// Every command the bot registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        setsuna::setsuna(),
        imaging::imagine(),
        imaging::describe(),
        imaging::ocr(),
    ]
}
