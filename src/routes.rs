mod submit;

pub use submit::submit_handler;

use actix_multipart::MultipartError;
use actix_web::error::{InternalError, PayloadError};
use actix_web::{HttpRequest, HttpResponse, Responder, get};
use serde::Serialize;

#[derive(Serialize)]
struct ErrorResponseWithMessage {
    reason: &'static str,
    code: u32,
    message: String,
}

/// Covers malformed and oversized multipart payloads, including a missing
/// code part, before the handler ever runs
pub fn multipart_error_handler(err: MultipartError, _req: &HttpRequest) -> actix_web::Error {
    let message = match &err {
        MultipartError::Payload(PayloadError::Overflow) => "Multipart form is too large.",
        _ => "Could not parse multipart form.",
    };
    let response = HttpResponse::BadRequest().json(ErrorResponseWithMessage {
        reason: "ERR_INVALID_ARGUMENT",
        code: 1,
        message: message.to_string(),
    });
    InternalError::from_response(err, response).into()
}

const INDEX_HTML: &str = r#"
<form method="POST" action="/" enctype="multipart/form-data">
<p><input type="file" name="code"></p>
<p><label>Expected output<br><textarea name="expected" rows="6" cols="40"></textarea></label></p>
<p><label>Stdin<br><textarea name="stdin" rows="6" cols="40"></textarea></label></p>
<p><label>Time limit (seconds) <input type="text" name="time_limit"></label></p>
<input type="submit" value="Submit">
</form>"#;

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}
