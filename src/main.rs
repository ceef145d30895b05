use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use aifans_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::{AlipayClient, PaymentGateway},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    tasks,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config =
        Config::from_toml().map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;

    // 创建数据库连接池
    let pool = Arc::new(create_pool(&config.database).await?);

    // 运行数据库迁移
    run_migrations(&pool).await?;

    // 创建JWT服务
    let jwt_service = JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expires_in,
        config.jwt.refresh_token_expires_in,
    );

    // 支付宝密钥无效时直接退出，避免上线后才发现无法下单
    let gateway: Arc<dyn PaymentGateway> = Arc::new(AlipayClient::new(config.alipay.clone())?);

    // 创建服务
    let auth_service = AuthService::new(pool.clone(), jwt_service.clone());
    let user_service = UserService::new(pool.clone());
    let payment_service = PaymentService::new(pool.clone(), gateway);
    let content_service = ContentService::new(pool.clone());
    let announcement_service = AnnouncementService::new(pool.clone());
    let storage_service = StorageService::new(config.storage.clone());

    // 启动后台任务
    tasks::spawn_all(payment_service.clone());

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors())
            .wrap(Logger::default())
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(payment_service.clone()))
            .app_data(web::Data::new(content_service.clone()))
            .app_data(web::Data::new(announcement_service.clone()))
            .app_data(web::Data::new(storage_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api")
                    .configure(handlers::auth_config)
                    .configure(handlers::user_config)
                    .configure(handlers::payment_config)
                    .configure(handlers::content_config)
                    .configure(handlers::announcement_config)
                    .configure(handlers::admin_config)
                    .configure(handlers::storage_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
