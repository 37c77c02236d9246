use std::collections::HashSet;

use serenity::model::application::ButtonStyle as ButtonStyleModel;
use url::Url;

/// A node in a message or modal component tree
///
/// Action rows are the only container nodes; everything else is a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    /// A row of components
    Row(ActionRow),
    /// A clickable button
    Button(Button),
    /// A string dropdown menu
    Menu(SelectMenu),
    /// A textbox, valid only inside modals
    TextInput(TextInput),
}

impl Component {
    /// The custom ID of this component, if it is a leaf that has one
    #[must_use]
    pub fn custom_id(&self) -> Option<&str> {
        match self {
            Self::Row(_) => None,
            Self::Button(b) => b.custom_id(),
            Self::Menu(m) => Some(&m.custom_id),
            Self::TextInput(t) => Some(&t.custom_id),
        }
    }

    /// The children of this component, if it is a container
    #[inline]
    #[must_use]
    pub fn children(&self) -> Option<&[Component]> {
        match self {
            Self::Row(ActionRow(c)) => Some(c),
            _ => None,
        }
    }
}

/// Remove every leaf whose custom ID appears in `ids`
///
/// Rows are rebuilt from their surviving children and dropped entirely if
/// none survive.  Leaves without a custom ID are always kept.
#[must_use]
pub fn remove_components<S: AsRef<str>>(components: Vec<Component>, ids: &[S]) -> Vec<Component> {
    let ids: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
    remove_rec(components, &ids)
}

fn remove_rec(components: Vec<Component>, ids: &HashSet<&str>) -> Vec<Component> {
    components
        .into_iter()
        .filter_map(|c| match c {
            Component::Row(ActionRow(children)) => {
                let children = remove_rec(children, ids);
                (!children.is_empty()).then_some(Component::Row(ActionRow(children)))
            },
            leaf => match leaf.custom_id() {
                Some(id) if ids.contains(id) => None,
                _ => Some(leaf),
            },
        })
        .collect()
}

/// Depth-first search for the leaf with the given custom ID
#[must_use]
pub fn find_component<'a>(components: &'a [Component], id: &str) -> Option<&'a Component> {
    components.iter().find_map(|c| match c.children() {
        Some(children) => find_component(children, id),
        None => (c.custom_id() == Some(id)).then_some(c),
    })
}

/// A row of components
#[derive(Debug, Clone, Default, PartialEq)]
#[repr(transparent)]
pub struct ActionRow(pub Vec<Component>);

impl ActionRow {
    /// Construct a row from the given leaves
    #[inline]
    #[must_use]
    pub fn new(children: impl IntoIterator<Item = impl Into<Component>>) -> Self {
        Self(children.into_iter().map(Into::into).collect())
    }
}

/// A single button component
#[derive(Debug, Clone, PartialEq)]
pub struct Button {
    /// The link or custom ID of this button
    pub kind: ButtonKind,
    /// The button's text
    pub label: String,
    /// Whether the button is greyed out
    pub disabled: bool,
}

/// Whether a button fires an interaction or opens a link
#[derive(Debug, Clone, PartialEq)]
pub enum ButtonKind {
    /// A link-style button
    Link(Url),
    /// A non-link button
    Custom {
        /// Button ID for callbacks
        custom_id: String,
        /// Button style
        style: ButtonStyle,
    },
}

impl Button {
    /// Construct a new secondary-style button
    #[must_use]
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: ButtonKind::Custom {
                custom_id: custom_id.into(),
                style: ButtonStyle::Secondary,
            },
            label: label.into(),
            disabled: false,
        }
    }

    /// Construct a new link button
    #[must_use]
    pub fn link(url: Url, label: impl Into<String>) -> Self {
        Self {
            kind: ButtonKind::Link(url),
            label: label.into(),
            disabled: false,
        }
    }

    /// Set the style of this button, if it is not a link
    #[must_use]
    pub fn style(mut self, style: ButtonStyle) -> Self {
        if let ButtonKind::Custom { style: ref mut s, .. } = self.kind {
            *s = style;
        }
        self
    }

    /// Set whether this button is disabled
    #[must_use]
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// The custom ID of this button, or `None` for links
    #[must_use]
    pub fn custom_id(&self) -> Option<&str> {
        match &self.kind {
            ButtonKind::Link(_) => None,
            ButtonKind::Custom { custom_id, .. } => Some(custom_id),
        }
    }
}

/// Style for non-link buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ButtonStyle {
    /// A primary (bold) button
    Primary,
    /// A secondary (faint) button
    Secondary,
    /// A success (green) button
    Success,
    /// A danger (red) button
    Danger,
}

impl From<ButtonStyle> for ButtonStyleModel {
    fn from(style: ButtonStyle) -> Self {
        match style {
            ButtonStyle::Primary => ButtonStyleModel::Primary,
            ButtonStyle::Secondary => ButtonStyleModel::Secondary,
            ButtonStyle::Success => ButtonStyleModel::Success,
            ButtonStyle::Danger => ButtonStyleModel::Danger,
        }
    }
}

/// A single string dropdown menu
#[derive(Debug, Clone, PartialEq)]
pub struct SelectMenu {
    /// Menu ID for callbacks
    pub custom_id: String,
    /// The selectable items
    pub items: Vec<MenuItem>,
    /// Text shown while nothing is selected
    pub placeholder: Option<String>,
    /// Minimum number of selected items
    pub min_values: u8,
    /// Maximum number of selected items
    pub max_values: Option<u8>,
    /// Whether the menu is greyed out
    pub disabled: bool,
}

impl SelectMenu {
    /// Construct a new single-choice menu
    #[must_use]
    pub fn new(custom_id: impl Into<String>, items: impl IntoIterator<Item = MenuItem>) -> Self {
        Self {
            custom_id: custom_id.into(),
            items: items.into_iter().collect(),
            placeholder: None,
            min_values: 1,
            max_values: Some(1),
            disabled: false,
        }
    }

    /// Set the empty placeholder text for this menu
    #[must_use]
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Set the range of selectable item counts
    #[must_use]
    pub fn count(mut self, min: u8, max: Option<u8>) -> Self {
        self.min_values = min;
        self.max_values = max;
        self
    }

    /// Set whether this menu is disabled
    #[must_use]
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// An item from a dropdown menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    /// Text shown to the user
    pub label: String,
    /// Value reported back when selected
    pub value: String,
    /// Secondary text shown under the label
    pub description: Option<String>,
    /// Whether the item starts selected
    pub default: bool,
}

impl MenuItem {
    /// Construct a new menu item
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            description: None,
            default: false,
        }
    }

    /// Set the description of this item
    #[must_use]
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Single- or multi-line textbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextInputStyle {
    /// A single-line textbox
    Short,
    /// A multi-line textbox
    Paragraph,
}

/// A textbox component, valid only for modals
///
/// On modal submissions `value` holds what the user entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextInput {
    /// Textbox ID, used to read the submitted value
    pub custom_id: String,
    /// Whether this is a short or paragraph textbox
    pub style: TextInputStyle,
    /// The label shown above the textbox
    pub label: String,
    /// Minimum input length
    pub min_len: Option<u16>,
    /// Maximum input length
    pub max_len: Option<u16>,
    /// Whether the field must be filled in
    pub required: bool,
    /// The pre-filled or submitted value
    pub value: Option<String>,
    /// Text shown while the textbox is empty
    pub placeholder: Option<String>,
}

impl TextInput {
    fn new(custom_id: impl Into<String>, style: TextInputStyle, label: impl Into<String>) -> Self {
        Self {
            custom_id: custom_id.into(),
            style,
            label: label.into(),
            min_len: None,
            max_len: None,
            required: true,
            value: None,
            placeholder: None,
        }
    }

    /// Construct a new short textbox
    #[inline]
    #[must_use]
    pub fn short(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(custom_id, TextInputStyle::Short, label)
    }

    /// Construct a new paragraph textbox
    #[inline]
    #[must_use]
    pub fn long(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(custom_id, TextInputStyle::Paragraph, label)
    }

    /// Set the valid length range for this textbox
    #[must_use]
    pub fn len(mut self, min: Option<u16>, max: Option<u16>) -> Self {
        self.min_len = min;
        self.max_len = max;
        self
    }

    /// Set whether this textbox is a required field
    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Set the pre-filled value for this textbox
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the empty placeholder text for this textbox
    #[must_use]
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }
}

impl From<ActionRow> for Component {
    #[inline]
    fn from(row: ActionRow) -> Self { Self::Row(row) }
}

impl From<Button> for Component {
    #[inline]
    fn from(btn: Button) -> Self { Self::Button(btn) }
}

impl From<SelectMenu> for Component {
    #[inline]
    fn from(menu: SelectMenu) -> Self { Self::Menu(menu) }
}

impl From<TextInput> for Component {
    #[inline]
    fn from(input: TextInput) -> Self { Self::TextInput(input) }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::{find_component, remove_components, ActionRow, Button, Component};

    fn btn(id: &str) -> Component { Button::new(id, id).into() }

    fn leaf_ids(tree: &[Component]) -> Vec<String> {
        let mut out = vec![];
        for c in tree {
            match c.children() {
                Some(children) => out.extend(leaf_ids(children)),
                None => out.extend(c.custom_id().map(ToOwned::to_owned)),
            }
        }
        out
    }

    fn has_empty_row(tree: &[Component]) -> bool {
        tree.iter().any(|c| match c.children() {
            Some(children) => children.is_empty() || has_empty_row(children),
            None => false,
        })
    }

    #[test]
    fn remove_drops_emptied_rows() {
        let tree = vec![
            ActionRow::new([btn("a"), btn("b")]).into(),
            ActionRow::new([btn("c")]).into(),
            btn("d"),
        ];

        let pruned = remove_components(tree, &["a", "b", "d"]);
        assert_eq!(pruned, vec![Component::from(ActionRow::new([btn("c")]))]);
    }

    #[test]
    fn remove_keeps_links() {
        let link = Button::link("https://example.com".parse().unwrap(), "site");
        let tree = vec![ActionRow::new([Component::from(link.clone()), btn("x")]).into()];

        let pruned = remove_components(tree, &["x"]);
        assert_eq!(pruned, vec![Component::from(ActionRow::new([link]))]);
    }

    #[test]
    fn find_descends_rows() {
        let tree = vec![btn("a"), ActionRow::new([btn("b"), btn("c")]).into()];

        assert_eq!(find_component(&tree, "c"), Some(&btn("c")));
        assert_eq!(find_component(&tree, "a"), Some(&btn("a")));
        assert!(find_component(&tree, "z").is_none());
    }

    fn tree() -> impl Strategy<Value = Vec<Component>> {
        let leaf = (0_u8..8).prop_map(|i| btn(&i.to_string()));
        let node = prop_oneof![
            leaf.clone(),
            prop::collection::vec(leaf, 0..5).prop_map(|c| ActionRow(c).into()),
        ];
        prop::collection::vec(node, 0..6)
    }

    proptest! {
        #[test]
        fn remove_is_a_filter(tree in tree(), ids in prop::collection::vec(0_u8..8, 0..8)) {
            let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
            let before = leaf_ids(&tree);
            let after_tree = remove_components(tree, &ids);
            let after = leaf_ids(&after_tree);

            let expected: Vec<_> = before.into_iter().filter(|i| !ids.contains(i)).collect();
            prop_assert_eq!(after, expected);
            prop_assert!(!has_empty_row(&after_tree));
            for id in &ids {
                prop_assert!(find_component(&after_tree, id).is_none());
            }
        }
    }
}
