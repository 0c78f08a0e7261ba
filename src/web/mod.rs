//! Browser automation over the W3C WebDriver protocol.

mod imagefx;
mod kling_web;
mod webdriver;

pub use imagefx::ImageFxGenerator;
pub use kling_web::KlingWebDriver;
pub use webdriver::{
    ElementRef, Locator, Session, SessionOptions, WebDriverClient, WebDriverError,
    FIND_POLL_INTERVAL,
};
