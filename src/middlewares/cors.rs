use actix_cors::Cors;

pub fn create_cors() -> Cors {
    Cors::default()
        .allowed_origin_fn(|_, _req_head| {
            // 在生产环境中应该限制允许的域名
            true
        })
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        // 编辑器上传与前端自定义 Header 都需要通过预检
        .allow_any_header()
        .supports_credentials()
        .max_age(3600)
}
