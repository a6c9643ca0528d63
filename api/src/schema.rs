// @generated-by-hand to mirror the Diesel CLI output for this crate's schema.

diesel::table! {
    use diesel::sql_types::*;

    sources (id) {
        id -> Int8,
        name -> Text,
        domain -> Text,
        feed_url -> Nullable<Text>,
        use_rss -> Bool,
        use_browser_fallback -> Bool,
        is_active -> Bool,
        rate_limit_sec -> Int4,
        max_articles_per_scrape -> Int4,
        last_scraped_at -> Nullable<Timestamptz>,
        last_success_at -> Nullable<Timestamptz>,
        consecutive_failures -> Int4,
        total_articles_scraped -> Int8,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    articles (id) {
        id -> Int8,
        title -> Text,
        summary -> Text,
        content -> Nullable<Text>,
        url -> Text,
        content_hash -> Nullable<Text>,
        published -> Timestamptz,
        source -> Text,
        author -> Nullable<Text>,
        category -> Nullable<Text>,
        keywords -> Array<Text>,
        image_url -> Nullable<Text>,
        content_extracted -> Bool,
        content_extracted_at -> Nullable<Timestamptz>,
        content_lock_at -> Nullable<Timestamptz>,
        content_attempts -> Int4,
        ai_processed -> Bool,
        ai_processed_at -> Nullable<Timestamptz>,
        ai_lock_at -> Nullable<Timestamptz>,
        ai_attempts -> Int4,
        ai_sentiment -> Nullable<Float8>,
        ai_sentiment_label -> Nullable<Text>,
        ai_summary -> Nullable<Text>,
        ai_categories -> Nullable<Jsonb>,
        ai_entities -> Nullable<Jsonb>,
        ai_keywords -> Nullable<Jsonb>,
        ai_stock_tickers -> Nullable<Jsonb>,
        ai_error -> Nullable<Text>,
        stock_data -> Nullable<Jsonb>,
        stock_data_updated_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    scraping_jobs (id) {
        id -> Int8,
        job_uuid -> Uuid,
        source -> Text,
        method -> Text,
        status -> Text,
        started_at -> Timestamptz,
        completed_at -> Nullable<Timestamptz>,
        execution_time_ms -> Nullable<Int8>,
        articles_found -> Int4,
        articles_new -> Int4,
        articles_updated -> Int4,
        articles_skipped -> Int4,
        error -> Nullable<Text>,
        error_code -> Nullable<Text>,
        retry_count -> Int4,
        max_retries -> Int4,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    email_messages (id) {
        id -> Int8,
        message_id -> Text,
        sender -> Text,
        subject -> Text,
        body_text -> Nullable<Text>,
        body_html -> Nullable<Text>,
        received_date -> Timestamptz,
        status -> Text,
        article_id -> Nullable<Int8>,
        retry_count -> Int4,
        max_retries -> Int4,
        error -> Nullable<Text>,
        last_retry_at -> Nullable<Timestamptz>,
        headers -> Nullable<Jsonb>,
        labels -> Array<Text>,
    }
}

diesel::joinable!(email_messages -> articles (article_id));

diesel::allow_tables_to_appear_in_same_query!(
    sources,
    articles,
    scraping_jobs,
    email_messages,
);
