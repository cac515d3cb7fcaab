use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    InvalidInput(String),
    InvalidData(String),
    Io(String),
    DateParse(String),
    SelectionOutOfRange(String),
    StorageRead(String),
    StorageWrite(String),
    Send(String),
}

impl AppError {
    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn date_parse<M: Into<String>>(message: M) -> Self {
        Self::DateParse(message.into())
    }

    pub fn selection_out_of_range<M: Into<String>>(message: M) -> Self {
        Self::SelectionOutOfRange(message.into())
    }

    pub fn storage_read<M: Into<String>>(message: M) -> Self {
        Self::StorageRead(message.into())
    }

    pub fn storage_write<M: Into<String>>(message: M) -> Self {
        Self::StorageWrite(message.into())
    }

    pub fn send<M: Into<String>>(message: M) -> Self {
        Self::Send(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidData(_) => "invalid_data",
            Self::Io(_) => "io_error",
            Self::DateParse(_) => "date_parse",
            Self::SelectionOutOfRange(_) => "selection_out_of_range",
            Self::StorageRead(_) => "storage_read",
            Self::StorageWrite(_) => "storage_write",
            Self::Send(_) => "send_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput(message) => message,
            Self::InvalidData(message) => message,
            Self::Io(message) => message,
            Self::DateParse(message) => message,
            Self::SelectionOutOfRange(message) => message,
            Self::StorageRead(message) => message,
            Self::StorageWrite(message) => message,
            Self::Send(message) => message,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code(), self.message())
    }
}

impl std::error::Error for AppError {}
