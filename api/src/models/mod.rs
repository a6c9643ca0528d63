pub mod article;
pub mod email_message;
pub mod scraping_job;
pub mod source;

pub use article::{Article, NewArticle};
pub use email_message::{EmailMessage, NewEmailMessage};
pub use scraping_job::{NewScrapingJob, ScrapingJob};
pub use source::{NewSource, Source};
