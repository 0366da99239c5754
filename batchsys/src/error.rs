use std::fmt;

#[derive(Debug)]
pub enum BatchSysError {
    Io(std::io::Error),
    Csv(String),
    MissingColumn(&'static str),
}

impl fmt::Display for BatchSysError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchSysError::Io(err) => write!(f, "I/O error: {}", err),
            BatchSysError::Csv(msg) => write!(f, "CSV error: {}", msg),
            BatchSysError::MissingColumn(name) => write!(f, "missing column: {}", name),
        }
    }
}

impl std::error::Error for BatchSysError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BatchSysError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BatchSysError {
    fn from(err: std::io::Error) -> Self {
        BatchSysError::Io(err)
    }
}

impl From<csv::Error> for BatchSysError {
    fn from(err: csv::Error) -> Self {
        BatchSysError::Csv(err.to_string())
    }
}
