//! imageauto library crate.
//!
//! AI image and video generation behind one service: a registry of video
//! backends with ordered fallback, a single image backend, FFmpeg editing and
//! an HTTP API.

pub mod cli;
pub mod config;
pub mod editor;
pub mod generator;
pub mod kling;
pub mod placeholder;
pub mod server;
pub mod service;
pub mod storage;
pub mod web;
