#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Screen {
    Login,
    Tasks,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InputMode {
    Navigate,
    Composing,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ComposerField {
    Title,
    Date,
}

impl ComposerField {
    pub fn other(self) -> ComposerField {
        match self {
            ComposerField::Title => ComposerField::Date,
            ComposerField::Date => ComposerField::Title,
        }
    }
}

/// Modal message that stays until dismissed.
#[derive(Clone, Debug)]
pub struct Alert {
    pub title: String,
    pub message: String,
}
