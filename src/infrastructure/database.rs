use crate::entities::{purchases, reviews, users, videos};
use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env;
use std::time::Duration;
use tracing::info;

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    info!("🔄 Running auto-migrations...");

    // Order matters for foreign keys: users/videos before purchases/reviews
    let stmts = vec![
        (
            "users",
            schema
                .create_table_from_entity(users::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "videos",
            schema
                .create_table_from_entity(videos::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "purchases",
            schema
                .create_table_from_entity(purchases::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "reviews",
            schema
                .create_table_from_entity(reviews::Entity)
                .if_not_exists()
                .to_owned(),
        ),
    ];

    for (name, stmt) in stmts {
        db.execute(builder.build(&stmt)).await?;
        info!("  ✔ Table ready: {}", name);
    }

    // One purchase and one review per (user, video)
    let indexes = vec![
        Index::create()
            .name("idx_purchases_user_video")
            .table(purchases::Entity)
            .col(purchases::Column::UserId)
            .col(purchases::Column::VideoId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_reviews_user_video")
            .table(reviews::Entity)
            .col(reviews::Column::UserId)
            .col(reviews::Column::VideoId)
            .unique()
            .if_not_exists()
            .to_owned(),
    ];

    for index in indexes {
        db.execute(builder.build(&index)).await?;
    }

    info!("✅ Migrations complete");

    Ok(())
}
