use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::error::CoreError;
use crate::models::email_message::{EmailMessage, NewEmailMessage};
use crate::schema::email_messages;

use super::Store;

impl Store {
    pub async fn seen_message(&self, message_id: &str) -> Result<bool, CoreError> {
        let mut conn = self.pool().get().await?;
        let exists: Option<i64> = email_messages::table
            .filter(email_messages::message_id.eq(message_id))
            .select(email_messages::id)
            .first(&mut conn)
            .await
            .optional()?;
        Ok(exists.is_some())
    }

    /// Persists an inbound message together with the Article it was
    /// converted into, in one round trip.
    pub async fn insert_processed_email(
        &self,
        mut email: NewEmailMessage,
        article: crate::models::article::NewArticle,
    ) -> Result<(i64, i64), CoreError> {
        use diesel_async::scoped_futures::ScopedFutureExt;
        let mut conn = self.pool().get().await?;
        let (email_id, article_id) = conn
            .transaction(|conn| {
                async move {
                    let article_row: crate::models::article::Article = diesel::insert_into(crate::schema::articles::table)
                        .values(&article)
                        .on_conflict(crate::schema::articles::url)
                        .do_update()
                        .set(crate::schema::articles::title.eq(crate::schema::articles::title))
                        .get_result(conn)
                        .await?;

                    // email articles arrive with their full body already in
                    // hand, so content_extracted is set here rather than
                    // left for ContentBackfill to (fruitlessly) refetch.
                    diesel::update(crate::schema::articles::table.find(article_row.id))
                        .set((
                            crate::schema::articles::content_extracted.eq(true),
                            crate::schema::articles::content_extracted_at.eq(Utc::now()),
                        ))
                        .execute(conn)
                        .await?;

                    email.status = "processed".to_string();
                    let email_id: i64 = diesel::insert_into(email_messages::table)
                        .values(&email)
                        .returning(email_messages::id)
                        .get_result(conn)
                        .await?;
                    diesel::update(email_messages::table.find(email_id))
                        .set(email_messages::article_id.eq(article_row.id))
                        .execute(conn)
                        .await?;

                    Ok((email_id, article_row.id))
                }
                .scope_boxed()
            })
            .await
            .map_err(CoreError::from)?;
        Ok((email_id, article_id))
    }

    pub async fn insert_ignored_email(&self, mut email: NewEmailMessage, reason: &str) -> Result<i64, CoreError> {
        email.status = "ignored".to_string();
        let mut conn = self.pool().get().await?;
        let id: i64 = diesel::insert_into(email_messages::table)
            .values(&email)
            .returning(email_messages::id)
            .get_result(&mut conn)
            .await?;
        diesel::update(email_messages::table.find(id))
            .set(email_messages::error.eq(reason))
            .execute(&mut conn)
            .await?;
        Ok(id)
    }

    /// Clamps `retry_count` at `max_retries` to preserve the
    /// `retry_count <= max_retries` invariant regardless of how many more
    /// times the ingestor is asked to retry a permanently-stuck message.
    pub async fn mark_email_retry(&self, id: i64, error: &str, max_retries: i32) -> Result<(), CoreError> {
        let mut conn = self.pool().get().await?;
        let next_count: i32 = diesel::update(email_messages::table.find(id))
            .set(email_messages::retry_count.eq(email_messages::retry_count + 1))
            .returning(email_messages::retry_count)
            .get_result(&mut conn)
            .await?;

        diesel::update(email_messages::table.find(id))
            .set((
                email_messages::retry_count.eq(next_count.min(max_retries)),
                email_messages::last_retry_at.eq(Utc::now()),
                email_messages::error.eq(error),
                email_messages::status.eq("failed"),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn list_email_messages(&self, limit: i64) -> Result<Vec<EmailMessage>, CoreError> {
        let mut conn = self.pool().get().await?;
        Ok(email_messages::table
            .order(email_messages::received_date.desc())
            .limit(limit.clamp(1, 100))
            .load(&mut conn)
            .await?)
    }
}
