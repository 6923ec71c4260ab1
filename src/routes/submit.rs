use actix_multipart::form::MultipartForm;
use actix_multipart::form::bytes::Bytes;
use actix_multipart::form::text::Text;
use actix_web::{HttpResponse, Responder, post, web};

use super::ErrorResponseWithMessage;
use crate::config::Config;
use crate::judge::{EntryName, Judge, NameError, Submission, Verdict, resolve_time_limit};

#[derive(Debug, MultipartForm)]
pub struct SubmitForm {
    /// Uploaded source file; its file name determines the entry name
    code: Bytes,
    stdin: Option<Bytes>,
    expected: Option<Bytes>,
    time_limit: Option<Text<String>>,
}

fn invalid_argument(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponseWithMessage {
        reason: "ERR_INVALID_ARGUMENT",
        code: 1,
        message,
    })
}

#[post("/")]
pub async fn submit_handler(
    judge: web::Data<Judge>,
    config: web::Data<Config>,
    MultipartForm(form): MultipartForm<SubmitForm>,
) -> impl Responder {
    let extension = &config.toolchain.source_extension;

    let Some(file_name) = form.code.file_name.as_deref() else {
        return invalid_argument("The code part must be an uploaded file.".to_string());
    };
    let entry = match EntryName::from_file_name(file_name, extension) {
        Ok(entry) => entry,
        Err(NameError::Extension) => {
            return invalid_argument(format!("{file_name} is not a .{extension} file."));
        }
        Err(NameError::Identifier) => {
            let stem = file_name
                .strip_suffix(&format!(".{extension}"))
                .unwrap_or(file_name);
            return invalid_argument(format!("{stem} is not a valid entry name."));
        }
    };

    let Some(expected) = form.expected else {
        return invalid_argument("An expected output is required.".to_string());
    };

    let time_limit = match resolve_time_limit(
        form.time_limit.as_ref().map(|t| t.as_str()),
        config.limits.default_time_limit_secs,
    ) {
        Ok(limit) => limit,
        Err(refused) => {
            return invalid_argument(format!("{} is not a positive time limit.", refused.0));
        }
    };

    let report = judge
        .run(Submission {
            entry,
            source: form.code.data.to_vec(),
            stdin: form.stdin.map(|part| part.data.to_vec()),
            expected: expected.data.to_vec(),
            time_limit,
        })
        .await;

    match report.status {
        Verdict::InternalError => HttpResponse::InternalServerError().json(report),
        _ => HttpResponse::Ok().json(report),
    }
}
