//! Interactive forms posted in response to a detected assistant action.
//!
//! Each input is addressed as `block_id` / `action_id` inside the block action
//! state, so the constants below are the contract between the form builders and
//! the submission handlers.

use hyperbot_core::domain::leave::{LEAVE_TYPES, WORKING_TIMES};

use crate::blocks::{
    ButtonElement, MessageBuilder, MessageTemplate, OptionObject, PickerElement,
    PlainTextInputElement, StaticSelectElement,
};

pub const CANDIDATE_FILE_BLOCK: &str = "candidate_file";
pub const CANDIDATE_FILE_INPUT: &str = "candidate_file_input";
pub const SUBMIT_CANDIDATE_FILE: &str = "submit_candidate_file";

pub const SKILL_FILE_BLOCK: &str = "skill_file";
pub const SKILL_FILE_INPUT: &str = "skill_file_input";
pub const PERSONAL_EMAIL_BLOCK: &str = "personal_email";
pub const PERSONAL_EMAIL_INPUT: &str = "personal_email_input";
pub const SUBMIT_WELCOME_NEW_EMPLOYEE: &str = "submit_welcome_new_employee";

pub const TRANSFORMATION_INPUT_BLOCK: &str = "transformation_input_file";
pub const TRANSFORMATION_INPUT_INPUT: &str = "transformation_input_file_input";
pub const TRANSFORMATION_OUTPUT_BLOCK: &str = "transformation_output_file";
pub const TRANSFORMATION_OUTPUT_INPUT: &str = "transformation_output_file_input";
pub const SUBMIT_CREATE_BUDDY: &str = "submit_create_buddy";

pub const SHEET_URL_BLOCK: &str = "sheet_url";
pub const SHEET_URL_INPUT: &str = "sheet_url_input";
pub const SHEET_NAME_BLOCK: &str = "sheet_name";
pub const SHEET_NAME_INPUT: &str = "sheet_name_input";
pub const SUBMIT_INTEGRATE_TRAINING: &str = "submit_integrate_training";
pub const SUBMIT_PRE_ONBOARD_EMAIL: &str = "submit_pre_onboard_email";

pub const LEAVE_TYPE_BLOCK: &str = "leave_type";
pub const LEAVE_TYPE_INPUT: &str = "leave_type_input";
pub const WORKING_TIME_INPUT: &str = "working_time_input";
pub const DATE_PICKERS_BLOCK: &str = "date_pickers";
pub const REQUEST_DATE_FROM_INPUT: &str = "request_date_from_input";
pub const REQUEST_DATE_TO_INPUT: &str = "request_date_to_input";
pub const TIME_PICKERS_BLOCK: &str = "time_pickers";
pub const HOUR_FROM_INPUT: &str = "hour_from_input";
pub const HOUR_TO_INPUT: &str = "hour_to_input";
pub const DESCRIPTION_BLOCK: &str = "description";
pub const DESCRIPTION_INPUT: &str = "description_input";
pub const WORKER_EMAIL_BLOCK: &str = "worker_email";
pub const WORKER_EMAIL_INPUT: &str = "email_input";
pub const SUBMIT_CREATE_LEAVE_REQUEST: &str = "submit_create_leave_request";

pub const CONFIRM_CONTINUE_THREAD_BLOCK: &str = "confirm_continue_thread";
pub const CONTINUE_THREAD: &str = "continue_thread";

const MAX_INPUT_LENGTH: u32 = 254;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Form {
    CandidateFile,
    WelcomeNewEmployee,
    Buddy,
    IntegrateTraining,
    PreOnboardEmail,
    LeaveRequest,
    ConfirmContinueThread,
}

impl Form {
    pub fn template(&self) -> MessageTemplate {
        match self {
            Self::CandidateFile => candidate_file_form(),
            Self::WelcomeNewEmployee => welcome_new_employee_form(),
            Self::Buddy => buddy_form(),
            Self::IntegrateTraining => sheet_form(SUBMIT_INTEGRATE_TRAINING),
            Self::PreOnboardEmail => sheet_form(SUBMIT_PRE_ONBOARD_EMAIL),
            Self::LeaveRequest => leave_request_form(),
            Self::ConfirmContinueThread => confirm_continue_thread_form(),
        }
    }

    pub fn submit_action_id(&self) -> &'static str {
        match self {
            Self::CandidateFile => SUBMIT_CANDIDATE_FILE,
            Self::WelcomeNewEmployee => SUBMIT_WELCOME_NEW_EMPLOYEE,
            Self::Buddy => SUBMIT_CREATE_BUDDY,
            Self::IntegrateTraining => SUBMIT_INTEGRATE_TRAINING,
            Self::PreOnboardEmail => SUBMIT_PRE_ONBOARD_EMAIL,
            Self::LeaveRequest => SUBMIT_CREATE_LEAVE_REQUEST,
            Self::ConfirmContinueThread => CONTINUE_THREAD,
        }
    }
}

fn link_input(action_id: &str, placeholder: &str) -> PlainTextInputElement {
    PlainTextInputElement::new(action_id)
        .placeholder(placeholder)
        .length(1, MAX_INPUT_LENGTH)
        .dispatch_on_enter()
}

fn submit_button(action_id: &str) -> ButtonElement {
    ButtonElement::new(action_id, "Submit").value(action_id)
}

pub fn candidate_file_form() -> MessageTemplate {
    MessageBuilder::new("Please enter the candidate file link (google sheet)")
        .section(|section| {
            section.mrkdwn("Please enter the candidate file link (google sheet)");
        })
        .input_with_hint(
            CANDIDATE_FILE_BLOCK,
            "Candidate File",
            "Enter the candidate file link (google sheet)",
            link_input(CANDIDATE_FILE_INPUT, "Enter the candidate file link (google sheet)"),
        )
        .actions(SUBMIT_CANDIDATE_FILE, |actions| {
            actions.button(submit_button(SUBMIT_CANDIDATE_FILE));
        })
        .build()
}

pub fn welcome_new_employee_form() -> MessageTemplate {
    MessageBuilder::new("Please enter the candidate file link (google sheet)")
        .section(|section| {
            section.mrkdwn("Please enter the candidate file link (google sheet)");
        })
        .input_with_hint(
            SKILL_FILE_BLOCK,
            "Skill File",
            "Enter the skill file link (google sheet)",
            link_input(SKILL_FILE_INPUT, "Enter the candidate file link (google sheet)"),
        )
        .input_with_hint(
            PERSONAL_EMAIL_BLOCK,
            "Personal Email",
            "Enter the personal email",
            link_input(PERSONAL_EMAIL_INPUT, "Enter the personal email"),
        )
        .actions(SUBMIT_WELCOME_NEW_EMPLOYEE, |actions| {
            actions.button(submit_button(SUBMIT_WELCOME_NEW_EMPLOYEE));
        })
        .build()
}

pub fn buddy_form() -> MessageTemplate {
    let prompt = "Please enter the transformation input and output file link (google sheet)";
    MessageBuilder::new(prompt)
        .section(|section| {
            section.mrkdwn(prompt);
        })
        .input_with_hint(
            TRANSFORMATION_INPUT_BLOCK,
            "Transformation Input File",
            "Enter the transformation input file link (google sheet)",
            link_input(
                TRANSFORMATION_INPUT_INPUT,
                "Enter the transformation input file link (google sheet)",
            ),
        )
        .input_with_hint(
            TRANSFORMATION_OUTPUT_BLOCK,
            "Transformation Output File",
            "Enter the transformation output file link (google sheet)",
            link_input(
                TRANSFORMATION_OUTPUT_INPUT,
                "Enter the transformation output file link (google sheet)",
            ),
        )
        .actions(SUBMIT_CREATE_BUDDY, |actions| {
            actions.button(submit_button(SUBMIT_CREATE_BUDDY));
        })
        .build()
}

/// Sheet url + sheet name form shared by the training and pre-onboard flows.
pub fn sheet_form(submit_action_id: &str) -> MessageTemplate {
    MessageBuilder::new("Please enter the sheet url and sheet name")
        .section(|section| {
            section.mrkdwn("Please enter the sheet url and sheet name");
        })
        .input_with_hint(
            SHEET_URL_BLOCK,
            "Sheet URL",
            "Enter the sheet url",
            link_input(SHEET_URL_INPUT, "Enter the sheet url"),
        )
        .input_with_hint(
            SHEET_NAME_BLOCK,
            "Sheet Name",
            "Enter the sheet name",
            link_input(SHEET_NAME_INPUT, "Enter the sheet name"),
        )
        .actions(submit_action_id, |actions| {
            actions.button(submit_button(submit_action_id));
        })
        .build()
}

pub fn leave_request_form() -> MessageTemplate {
    let leave_types = LEAVE_TYPES.iter().fold(
        StaticSelectElement::new(LEAVE_TYPE_INPUT, "Select leave type"),
        |select, entry| select.option(OptionObject::new(entry.name, entry.code.to_string())),
    );
    let working_times = WORKING_TIMES.iter().fold(
        StaticSelectElement::new(WORKING_TIME_INPUT, "Select working time"),
        |select, entry| select.option(OptionObject::new(entry.name, entry.code.to_string())),
    );

    MessageBuilder::new("Please enter the leave request information")
        .section(|section| {
            section.mrkdwn("Please enter the leave request information");
        })
        .section(|section| {
            section.field("*Leave Type*").field("*Working Time*");
        })
        .actions(LEAVE_TYPE_BLOCK, |actions| {
            actions.static_select(leave_types).static_select(working_times);
        })
        .section(|section| {
            section.field("*Request Date From*").field("*Request Date To*");
        })
        .actions(DATE_PICKERS_BLOCK, |actions| {
            actions
                .datepicker(PickerElement::new(REQUEST_DATE_FROM_INPUT).placeholder("Select start date"))
                .datepicker(PickerElement::new(REQUEST_DATE_TO_INPUT).placeholder("Select end date"));
        })
        .section(|section| {
            section.field("*Hour From*").field("*Hour To*");
        })
        .actions(TIME_PICKERS_BLOCK, |actions| {
            actions
                .timepicker(PickerElement::new(HOUR_FROM_INPUT).placeholder("Select start time"))
                .timepicker(PickerElement::new(HOUR_TO_INPUT).placeholder("Select end time"));
        })
        .input(
            DESCRIPTION_BLOCK,
            "Description",
            PlainTextInputElement::new(DESCRIPTION_INPUT)
                .placeholder("Enter the description")
                .length(0, MAX_INPUT_LENGTH)
                .dispatch_on_enter(),
        )
        .input(
            WORKER_EMAIL_BLOCK,
            "Work Email",
            PlainTextInputElement::new(WORKER_EMAIL_INPUT)
                .placeholder("Enter your work email")
                .length(1, MAX_INPUT_LENGTH),
        )
        .actions(SUBMIT_CREATE_LEAVE_REQUEST, |actions| {
            actions.button(submit_button(SUBMIT_CREATE_LEAVE_REQUEST));
        })
        .build()
}

pub fn confirm_continue_thread_form() -> MessageTemplate {
    let prompt = "We will close the thread after 1 minute, if you want to continue the conversation, please click the button below";
    MessageBuilder::new(prompt)
        .section(|section| {
            section.mrkdwn(prompt);
        })
        .actions(CONFIRM_CONTINUE_THREAD_BLOCK, |actions| {
            actions.button(ButtonElement::new(CONTINUE_THREAD, "Continue Thread").value(CONTINUE_THREAD));
        })
        .build()
}
