pub mod error;
pub mod feed;
pub mod repos;
pub mod sitemap;
pub mod sync;
pub mod syndication;
