//! tagpress - A lightweight blogging backend with tag-aware post search
//!
//! This library provides the core functionality for the tagpress backend:
//! post search and pagination, post and comment management, image storage,
//! and the REST API that exposes them.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod search;
pub mod services;
