use actix_multipart::form::MultipartFormConfig;
use actix_web::{App, HttpServer, dev::Server, middleware, web};

use crate::config::Config;
use crate::judge::Judge;
use crate::routes::{index, multipart_error_handler, submit_handler};

pub fn build_server(config: Config) -> std::io::Result<Server> {
    let judge = web::Data::new(Judge::new(&config));
    let max_submission_bytes = config.limits.max_submission_bytes;
    let server_config = config.server.clone();
    let config = web::Data::new(config);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(judge.clone())
            .app_data(config.clone())
            .app_data(
                MultipartFormConfig::default()
                    .total_limit(max_submission_bytes)
                    .memory_limit(max_submission_bytes)
                    .error_handler(multipart_error_handler),
            )
            .wrap(middleware::Logger::default())
            .service(index)
            .service(submit_handler)
    })
    .bind((
        server_config
            .bind_address
            .unwrap_or("127.0.0.1".to_string()),
        server_config.bind_port.unwrap_or(8000),
    ))?
    .run();

    Ok(server)
}
