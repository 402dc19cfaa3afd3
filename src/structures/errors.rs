use actix_web::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UptimersError {
    #[error("IO error\n{0}")]
    Read(#[from] std::io::Error),

    #[error("askama templating error\n{0}")]
    Askama(#[from] askama::Error),

    #[error("reqwest error\n{0}")]
    Probe(#[from] reqwest::Error),

    #[error("redb database error\n{0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb transaction error\n{0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("redb table error\n{0}")]
    Table(#[from] redb::TableError),

    #[error("redb storage error\n{0}")]
    Storage(#[from] redb::StorageError),

    #[error("redb commit error\n{0}")]
    Commit(#[from] redb::CommitError),

    #[error("serde_json error\n{0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("serde_yaml error\n{0}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("time format error\n{0}")]
    TimeFormat(#[from] time::error::Format),

    #[error("time parse error\n{0}")]
    TimeParse(#[from] time::error::Parse),

    #[error("blocking task error\n{0}")]
    Blocking(#[from] actix_web::error::BlockingError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("invalid config: {0}")]
    Config(String),
}

impl actix_web::error::ResponseError for UptimersError {
    fn status_code(&self) -> StatusCode {
        match self {
            UptimersError::NotFound(_) => StatusCode::NOT_FOUND,
            UptimersError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
