/// PENDING is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Accepted => "ACCEPTED",
            RequestStatus::Declined => "DECLINED",
            RequestStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(RequestStatus::Pending),
            "ACCEPTED" => Some(RequestStatus::Accepted),
            "DECLINED" => Some(RequestStatus::Declined),
            "CANCELLED" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}
