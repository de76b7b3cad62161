use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    #[serde(rename = "mrkdwn")]
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OptionObject {
    pub text: TextObject,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<TextObject>,
}

impl OptionObject {
    pub fn new(text: impl Into<String>, value: impl Into<String>) -> Self {
        Self { text: TextObject::plain(text), value: value.into(), description: None }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(TextObject::plain(description));
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { action_id: action_id.into(), text: TextObject::plain(label), value: None }
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StaticSelectElement {
    pub action_id: String,
    pub placeholder: TextObject,
    pub options: Vec<OptionObject>,
}

impl StaticSelectElement {
    pub fn new(action_id: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            placeholder: TextObject::plain(placeholder),
            options: Vec::new(),
        }
    }

    pub fn option(mut self, option: OptionObject) -> Self {
        self.options.push(option);
        self
    }
}

/// Shared shape of `datepicker` and `timepicker` elements.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PickerElement {
    pub action_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<TextObject>,
}

impl PickerElement {
    pub fn new(action_id: impl Into<String>) -> Self {
        Self { action_id: action_id.into(), placeholder: None }
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(TextObject::plain(placeholder));
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DispatchActionConfig {
    pub trigger_actions_on: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlainTextInputElement {
    pub action_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<TextObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch_action_config: Option<DispatchActionConfig>,
}

impl PlainTextInputElement {
    pub fn new(action_id: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            placeholder: None,
            min_length: None,
            max_length: None,
            dispatch_action_config: None,
        }
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(TextObject::plain(placeholder));
        self
    }

    pub fn length(mut self, min: u32, max: u32) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    pub fn dispatch_on_enter(mut self) -> Self {
        self.dispatch_action_config = Some(DispatchActionConfig {
            trigger_actions_on: vec!["on_enter_pressed".to_owned()],
        });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckboxesElement {
    pub action_id: String,
    pub options: Vec<OptionObject>,
}

impl CheckboxesElement {
    pub fn new(action_id: impl Into<String>) -> Self {
        Self { action_id: action_id.into(), options: Vec::new() }
    }

    pub fn option(mut self, option: OptionObject) -> Self {
        self.options.push(option);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Button(ButtonElement),
    StaticSelect(StaticSelectElement),
    Datepicker(PickerElement),
    Timepicker(PickerElement),
    PlainTextInput(PlainTextInputElement),
    Checkboxes(CheckboxesElement),
}

impl Element {
    pub fn action_id(&self) -> &str {
        match self {
            Self::Button(element) => &element.action_id,
            Self::StaticSelect(element) => &element.action_id,
            Self::Datepicker(element) | Self::Timepicker(element) => &element.action_id,
            Self::PlainTextInput(element) => &element.action_id,
            Self::Checkboxes(element) => &element.action_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        #[serde(skip_serializing_if = "Option::is_none")]
        block_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<TextObject>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        fields: Vec<TextObject>,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<Element>,
    },
    Actions {
        block_id: String,
        elements: Vec<Element>,
    },
    Input {
        block_id: String,
        label: TextObject,
        element: Element,
        #[serde(skip_serializing_if = "Option::is_none")]
        hint: Option<TextObject>,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        dispatch_action: bool,
    },
    Context {
        block_id: String,
        elements: Vec<TextObject>,
    },
}

impl Block {
    pub fn block_id(&self) -> Option<&str> {
        match self {
            Self::Section { block_id, .. } => block_id.as_deref(),
            Self::Actions { block_id, .. }
            | Self::Input { block_id, .. }
            | Self::Context { block_id, .. } => Some(block_id),
        }
    }

    /// Action ids of every interactive element in the block.
    pub fn action_ids(&self) -> Vec<&str> {
        match self {
            Self::Section { accessory, .. } => {
                accessory.iter().map(Element::action_id).collect()
            }
            Self::Actions { elements, .. } => elements.iter().map(Element::action_id).collect(),
            Self::Input { element, .. } => vec![element.action_id()],
            Self::Context { .. } => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttachmentField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

/// Legacy secondary attachment, still used for colored notices.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
}

impl Attachment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn pretext(mut self, pretext: impl Into<String>) -> Self {
        self.pretext = Some(pretext.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn field(mut self, title: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(AttachmentField { title: title.into(), value: value.into(), short: true });
        self
    }

    pub fn block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
    pub attachments: Vec<Attachment>,
}

impl MessageTemplate {
    pub fn text(text: impl Into<String>) -> Self {
        Self { fallback_text: text.into(), blocks: Vec::new(), attachments: Vec::new() }
    }

    pub fn find_block(&self, block_id: &str) -> Option<&Block> {
        self.blocks.iter().find(|block| block.block_id() == Some(block_id))
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
    attachments: Vec<Attachment>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new(), attachments: Vec::new() }
    }

    pub fn section<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(builder.build());
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn input(
        mut self,
        block_id: impl Into<String>,
        label: impl Into<String>,
        element: PlainTextInputElement,
    ) -> Self {
        self.blocks.push(Block::Input {
            block_id: block_id.into(),
            label: TextObject::plain(label),
            element: Element::PlainTextInput(element),
            hint: None,
            dispatch_action: false,
        });
        self
    }

    pub fn input_with_hint(
        mut self,
        block_id: impl Into<String>,
        label: impl Into<String>,
        hint: impl Into<String>,
        element: PlainTextInputElement,
    ) -> Self {
        let dispatch_action = element.dispatch_action_config.is_some();
        self.blocks.push(Block::Input {
            block_id: block_id.into(),
            label: TextObject::plain(label),
            element: Element::PlainTextInput(element),
            hint: Some(TextObject::plain(hint)),
            dispatch_action,
        });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate {
            fallback_text: self.fallback_text,
            blocks: self.blocks,
            attachments: self.attachments,
        }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    block_id: Option<String>,
    text: Option<TextObject>,
    fields: Vec<TextObject>,
    accessory: Option<Element>,
}

impl SectionBuilder {
    pub fn block_id(&mut self, block_id: impl Into<String>) -> &mut Self {
        self.block_id = Some(block_id.into());
        self
    }

    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn field(&mut self, text: impl Into<String>) -> &mut Self {
        self.fields.push(TextObject::mrkdwn(text));
        self
    }

    pub fn accessory(&mut self, element: Element) -> &mut Self {
        self.accessory = Some(element);
        self
    }

    fn build(self) -> Block {
        Block::Section {
            block_id: self.block_id,
            text: self.text,
            fields: self.fields,
            accessory: self.accessory,
        }
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<Element>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(Element::Button(button));
        self
    }

    pub fn static_select(&mut self, select: StaticSelectElement) -> &mut Self {
        self.elements.push(Element::StaticSelect(select));
        self
    }

    pub fn datepicker(&mut self, picker: PickerElement) -> &mut Self {
        self.elements.push(Element::Datepicker(picker));
        self
    }

    pub fn timepicker(&mut self, picker: PickerElement) -> &mut Self {
        self.elements.push(Element::Timepicker(picker));
        self
    }

    fn build(self) -> Vec<Element> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Message carrying a single attachment whose pretext is `text`.
pub fn notice_message(text: &str) -> MessageTemplate {
    MessageBuilder::new(text).attachment(Attachment::new().pretext(text)).build()
}
