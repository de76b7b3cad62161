//! UiPath orchestrator job records and the typed process arguments exchanged
//! with the orchestrator.
//!
//! Output arguments arrive as a JSON string inside the job details payload;
//! [`job_outcome`] turns that string plus the job state into the message the
//! requesting Slack channel should receive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const GENERIC_FAILURE_MESSAGE: &str = "Sorry, something went wrong. Please try again later.";
pub const LEAVE_FALLBACK_MESSAGE: &str = "sorry, something went wrong - please try again later";
pub const LEAVE_SUCCESS_MESSAGE: &str =
    "Leave request created successfully. Please check your calendar.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub i64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Running,
    Successful,
    Faulted,
    Stopped,
    Unknown(String),
}

impl JobState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Successful => "Successful",
            Self::Faulted => "Faulted",
            Self::Stopped => "Stopped",
            Self::Unknown(value) => value.as_str(),
        }
    }

    /// Orchestrator states are PascalCase; anything unrecognised is kept verbatim.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Successful" => Self::Successful,
            "Faulted" => Self::Faulted,
            "Stopped" => Self::Stopped,
            other => Self::Unknown(other.to_owned()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::Faulted | Self::Stopped)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    WelcomeNewEmployee,
    FillBuddyForm,
    CreateLeaveRequest,
    IntegrateTrainingForm,
    PreOnboardEmail,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WelcomeNewEmployee => "welcome_new_employee",
            Self::FillBuddyForm => "fill_buddy_form",
            Self::CreateLeaveRequest => "create_leave_request",
            Self::IntegrateTrainingForm => "integrate_training_form",
            Self::PreOnboardEmail => "pre_onboard_email",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "welcome_new_employee" => Some(Self::WelcomeNewEmployee),
            "fill_buddy_form" => Some(Self::FillBuddyForm),
            "create_leave_request" => Some(Self::CreateLeaveRequest),
            "integrate_training_form" => Some(Self::IntegrateTrainingForm),
            "pre_onboard_email" => Some(Self::PreOnboardEmail),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiPathJob {
    pub job_id: JobId,
    pub state: JobState,
    pub error: Option<String>,
    pub output: Option<String>,
    pub slack_channel: String,
    pub job_type: JobType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UiPathJob {
    pub fn pending(
        job_id: JobId,
        job_type: JobType,
        slack_channel: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id,
            state: JobState::Pending,
            error: None,
            output: None,
            slack_channel: slack_channel.into(),
            job_type,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetingInput {
    #[serde(rename = "SkillFile")]
    pub skill_file: String,
    #[serde(rename = "PersonalEmail")]
    pub personal_email: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreetingOutput {
    #[serde(rename = "Position")]
    pub position: String,
    #[serde(rename = "Skill")]
    pub skill: String,
    #[serde(rename = "Division")]
    pub division: String,
    #[serde(rename = "FullName")]
    pub full_name: String,
    #[serde(rename = "Greeting")]
    pub greeting: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillBuddyInput {
    pub input_sheet: String,
    pub output_sheet: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FillBuddyOutput {
    pub buddy_form_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequestInput {
    /// `dd/mm/yyyy`
    pub request_date_from: String,
    /// `dd/mm/yyyy`
    pub request_date_to: String,
    pub description: String,
    pub calendar_id: i64,
    pub holiday_status_id: i64,
    pub hour_from: i64,
    pub hour_to: i64,
    pub work_email: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaveRequestOutput {
    pub response: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaveRpcResponse {
    pub jsonrpc: String,
    pub id: Option<serde_json::Value>,
    pub result: Option<LeaveRpcResult>,
    pub error: Option<LeaveRpcError>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaveRpcResult {
    pub code: i64,
    pub res_id: Option<i64>,
    pub employee_name: Option<String>,
    pub holiday_status_name: Option<String>,
    pub period: Option<String>,
    pub status: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaveRpcError {
    pub message: String,
    pub code: i64,
    pub data: LeaveRpcErrorData,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaveRpcErrorData {
    pub name: String,
    pub debug: String,
    pub message: String,
    pub arguments: Vec<String>,
    pub exception_type: String,
}

/// Shared by the integrate-training and pre-onboard-email processes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetProcessInput {
    #[serde(rename = "sheetURL")]
    pub sheet_url: String,
    #[serde(rename = "sheetName")]
    pub sheet_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SheetProcessOutput {
    pub err_message: String,
    pub calendar_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Pending,
    Completed(String),
    Failed(String),
}

impl JobOutcome {
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Pending => None,
            Self::Completed(message) | Self::Failed(message) => Some(message),
        }
    }
}

pub fn job_outcome(job_type: JobType, state: &JobState, output: Option<&str>) -> JobOutcome {
    match state {
        JobState::Successful => successful_outcome(job_type, output.unwrap_or_default()),
        JobState::Faulted | JobState::Stopped => {
            JobOutcome::Failed(GENERIC_FAILURE_MESSAGE.to_owned())
        }
        _ => JobOutcome::Pending,
    }
}

fn successful_outcome(job_type: JobType, output: &str) -> JobOutcome {
    let generic = || JobOutcome::Failed(GENERIC_FAILURE_MESSAGE.to_owned());

    match job_type {
        JobType::WelcomeNewEmployee => match serde_json::from_str::<GreetingOutput>(output) {
            Ok(parsed) => JobOutcome::Completed(parsed.greeting),
            Err(_) => generic(),
        },
        JobType::FillBuddyForm => match serde_json::from_str::<FillBuddyOutput>(output) {
            Ok(parsed) => JobOutcome::Completed(format!(
                "Buddy form created successfully. Please check file {}",
                parsed.buddy_form_name
            )),
            Err(_) => generic(),
        },
        JobType::CreateLeaveRequest => leave_outcome(output),
        JobType::IntegrateTrainingForm | JobType::PreOnboardEmail => {
            match serde_json::from_str::<SheetProcessOutput>(output) {
                Ok(parsed) if !parsed.calendar_id.is_empty() => {
                    JobOutcome::Completed(parsed.calendar_id)
                }
                Ok(parsed) if !parsed.err_message.is_empty() => {
                    JobOutcome::Failed(parsed.err_message)
                }
                _ => generic(),
            }
        }
    }
}

// The robot returns the ERP JSON-RPC body as a string inside `response`.
fn leave_outcome(output: &str) -> JobOutcome {
    let Ok(wrapper) = serde_json::from_str::<LeaveRequestOutput>(output) else {
        return JobOutcome::Failed(GENERIC_FAILURE_MESSAGE.to_owned());
    };
    let Ok(rpc) = serde_json::from_str::<LeaveRpcResponse>(&wrapper.response) else {
        return JobOutcome::Failed(GENERIC_FAILURE_MESSAGE.to_owned());
    };

    if rpc.result.as_ref().is_some_and(|result| result.code == 200) {
        return JobOutcome::Completed(LEAVE_SUCCESS_MESSAGE.to_owned());
    }

    match rpc.error {
        Some(error) if !error.data.message.is_empty() => JobOutcome::Failed(error.data.message),
        _ => JobOutcome::Failed(LEAVE_FALLBACK_MESSAGE.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        job_outcome, JobOutcome, JobState, JobType, GENERIC_FAILURE_MESSAGE,
        LEAVE_FALLBACK_MESSAGE, LEAVE_SUCCESS_MESSAGE,
    };

    #[test]
    fn non_terminal_states_stay_pending() {
        for state in [JobState::Pending, JobState::Running, JobState::parse("Suspended")] {
            assert!(!state.is_terminal());
            assert_eq!(job_outcome(JobType::FillBuddyForm, &state, None), JobOutcome::Pending);
        }
    }

    #[test]
    fn greeting_output_posts_greeting_text() {
        let output = json!({
            "Position": "Backend Engineer",
            "Skill": "Rust",
            "Division": "D1",
            "FullName": "Tran Van A",
            "Greeting": "Welcome aboard, A!"
        })
        .to_string();

        let outcome =
            job_outcome(JobType::WelcomeNewEmployee, &JobState::Successful, Some(&output));
        assert_eq!(outcome, JobOutcome::Completed("Welcome aboard, A!".to_owned()));
    }

    #[test]
    fn buddy_output_names_the_created_file() {
        let output = json!({ "buddyFormName": "Buddy-2026-10" }).to_string();
        let outcome = job_outcome(JobType::FillBuddyForm, &JobState::Successful, Some(&output));
        assert_eq!(
            outcome.message(),
            Some("Buddy form created successfully. Please check file Buddy-2026-10")
        );
    }

    #[test]
    fn leave_output_success_and_error_paths() {
        let ok = json!({
            "response": json!({ "jsonrpc": "2.0", "id": "1", "result": { "code": 200, "res_id": 9 } })
                .to_string()
        })
        .to_string();
        assert_eq!(
            job_outcome(JobType::CreateLeaveRequest, &JobState::Successful, Some(&ok)),
            JobOutcome::Completed(LEAVE_SUCCESS_MESSAGE.to_owned())
        );

        let rejected = json!({
            "response": json!({
                "jsonrpc": "2.0",
                "id": null,
                "error": {
                    "message": "Odoo Server Error",
                    "code": 200,
                    "data": { "name": "ValidationError", "message": "You already booked this day" }
                }
            })
            .to_string()
        })
        .to_string();
        assert_eq!(
            job_outcome(JobType::CreateLeaveRequest, &JobState::Successful, Some(&rejected)),
            JobOutcome::Failed("You already booked this day".to_owned())
        );

        let empty = json!({ "response": "{}" }).to_string();
        assert_eq!(
            job_outcome(JobType::CreateLeaveRequest, &JobState::Successful, Some(&empty)),
            JobOutcome::Failed(LEAVE_FALLBACK_MESSAGE.to_owned())
        );
    }

    #[test]
    fn training_output_prefers_calendar_id_then_error_message() {
        let created = json!({ "calendarId": "cal-123", "errMessage": "" }).to_string();
        assert_eq!(
            job_outcome(JobType::IntegrateTrainingForm, &JobState::Successful, Some(&created)),
            JobOutcome::Completed("cal-123".to_owned())
        );

        let failed = json!({ "calendarId": "", "errMessage": "Sheet not shared" }).to_string();
        assert_eq!(
            job_outcome(JobType::PreOnboardEmail, &JobState::Successful, Some(&failed)),
            JobOutcome::Failed("Sheet not shared".to_owned())
        );
    }

    #[test]
    fn faulted_and_unparseable_outputs_use_generic_failure() {
        assert_eq!(
            job_outcome(JobType::WelcomeNewEmployee, &JobState::Faulted, None),
            JobOutcome::Failed(GENERIC_FAILURE_MESSAGE.to_owned())
        );
        assert_eq!(
            job_outcome(JobType::WelcomeNewEmployee, &JobState::Successful, Some("not json")),
            JobOutcome::Failed(GENERIC_FAILURE_MESSAGE.to_owned())
        );
    }

    #[test]
    fn job_type_storage_names_round_trip() {
        for job_type in [
            JobType::WelcomeNewEmployee,
            JobType::FillBuddyForm,
            JobType::CreateLeaveRequest,
            JobType::IntegrateTrainingForm,
            JobType::PreOnboardEmail,
        ] {
            assert_eq!(JobType::parse(job_type.as_str()), Some(job_type));
        }
    }
}
