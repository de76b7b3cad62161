use hyperbot_slack::{blocks::MessageTemplate, forms::Form};

/// Maps an assistant action token to the Slack form the user is shown next.
#[derive(Clone, Debug, Default)]
pub struct ActionRouter;

impl ActionRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, action: &str) -> Option<Form> {
        match action.trim() {
            "candidate_sheet" | "handle_candidate_file" => Some(Form::CandidateFile),
            "onboard_nhan_vien" | "welcome_new_employee" => Some(Form::WelcomeNewEmployee),
            "create_buddy" | "fill_buddy_form" => Some(Form::Buddy),
            "create_leave_request" => Some(Form::LeaveRequest),
            "integrate_training" => Some(Form::IntegrateTraining),
            "pre_onboard_email" => Some(Form::PreOnboardEmail),
            "close_thread" => Some(Form::ConfirmContinueThread),
            _ => None,
        }
    }
}

pub fn confirm_close_thread_message() -> MessageTemplate {
    Form::ConfirmContinueThread.template()
}
