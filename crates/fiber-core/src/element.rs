//! Immutable virtual nodes describing the desired shape of the host tree.
//!
//! An [`Element`] is either a host element (a tag name), the reserved text
//! kind, or a component: a plain function from [`Props`] to a single element.
//! Elements are cheap to clone; their props are shared behind an `Rc`.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Attribute under which text elements carry their content.
pub const TEXT_VALUE: &str = "value";

/// A function component. Two components are the same kind only when they wrap
/// the identical function.
#[derive(Clone, Copy)]
pub struct ComponentFn {
    name: &'static str,
    render: fn(&Props) -> Element,
}

impl ComponentFn {
    pub const fn new(name: &'static str, render: fn(&Props) -> Element) -> Self {
        Self { name, render }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn call(&self, props: &Props) -> Element {
        (self.render)(props)
    }
}

impl PartialEq for ComponentFn {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::fn_addr_eq(self.render, other.render)
    }
}

impl Eq for ComponentFn {}

impl fmt::Debug for ComponentFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentFn").field(&self.name).finish()
    }
}

/// Wraps a `fn(&Props) -> Element` into a [`ComponentFn`] named after the function.
#[macro_export]
macro_rules! component {
    ($render:path) => {
        $crate::ComponentFn::new(stringify!($render), $render)
    };
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Host(Cow<'static, str>),
    Text,
    Component(ComponentFn),
}

impl From<&'static str> for ElementKind {
    fn from(tag: &'static str) -> Self {
        ElementKind::Host(Cow::Borrowed(tag))
    }
}

impl From<String> for ElementKind {
    fn from(tag: String) -> Self {
        ElementKind::Host(Cow::Owned(tag))
    }
}

impl From<ComponentFn> for ElementKind {
    fn from(component: ComponentFn) -> Self {
        ElementKind::Component(component)
    }
}

/// Event callback bound through an attribute. Listeners compare by identity.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn()>);

impl Listener {
    pub fn new(callback: impl Fn() + 'static) -> Self {
        Self(Rc::new(callback))
    }

    pub fn call(&self) {
        (self.0)()
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Str(Cow<'static, str>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Listener(Listener),
}

impl AttrValue {
    pub fn as_listener(&self) -> Option<&Listener> {
        match self {
            AttrValue::Listener(listener) => Some(listener),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(value) => f.write_str(value),
            AttrValue::Int(value) => write!(f, "{value}"),
            AttrValue::Float(value) => write!(f, "{value}"),
            AttrValue::Bool(value) => write!(f, "{value}"),
            AttrValue::Listener(listener) => write!(f, "{listener:?}"),
        }
    }
}

impl From<&'static str> for AttrValue {
    fn from(value: &'static str) -> Self {
        AttrValue::Str(Cow::Borrowed(value))
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(Cow::Owned(value))
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(i64::from(value))
    }
}

impl From<u32> for AttrValue {
    fn from(value: u32) -> Self {
        AttrValue::Int(i64::from(value))
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<Listener> for AttrValue {
    fn from(listener: Listener) -> Self {
        AttrValue::Listener(listener)
    }
}

/// Attributes plus the ordered child list of an element.
///
/// `None` children are placeholders left by conditional rendering: they
/// produce no work node but still occupy a position when diffing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Props {
    attributes: IndexMap<String, AttrValue>,
    children: Vec<Option<Element>>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_children(children: Vec<Option<Element>>) -> Self {
        Self {
            attributes: IndexMap::new(),
            children,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attributes.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn children(&self) -> &[Option<Element>] {
        &self.children
    }
}

#[derive(Clone, PartialEq)]
pub struct Element {
    kind: ElementKind,
    props: Rc<Props>,
}

impl Element {
    pub fn new(kind: impl Into<ElementKind>) -> Self {
        Self {
            kind: kind.into(),
            props: Rc::new(Props::default()),
        }
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub(crate) fn shared_props(&self) -> Rc<Props> {
        Rc::clone(&self.props)
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Rc::make_mut(&mut self.props)
            .attributes
            .insert(key.into(), value.into());
        self
    }

    pub fn child(mut self, child: impl Into<Child>) -> Self {
        Rc::make_mut(&mut self.props).children.push(child.into().0);
        self
    }

    pub fn children<C: Into<Child>>(mut self, children: impl IntoIterator<Item = C>) -> Self {
        let props = Rc::make_mut(&mut self.props);
        props
            .children
            .extend(children.into_iter().map(|child| child.into().0));
        self
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("kind", &self.kind)
            .field("props", &self.props)
            .finish()
    }
}

/// One entry of a child list: an element, text to normalize, or nothing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Child(Option<Element>);

impl From<Element> for Child {
    fn from(element: Element) -> Self {
        Self(Some(element))
    }
}

impl From<Option<Element>> for Child {
    fn from(element: Option<Element>) -> Self {
        Self(element)
    }
}

impl From<&'static str> for Child {
    fn from(text: &'static str) -> Self {
        Self(Some(create_text_element(text)))
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Self(Some(create_text_element(text)))
    }
}

impl From<i64> for Child {
    fn from(value: i64) -> Self {
        Self(Some(create_text_element(value)))
    }
}

impl From<i32> for Child {
    fn from(value: i32) -> Self {
        Self(Some(create_text_element(value)))
    }
}

impl From<f64> for Child {
    fn from(value: f64) -> Self {
        Self(Some(create_text_element(value)))
    }
}

/// Build an element from its kind, attributes and children.
pub fn create_element<K, V, C>(
    kind: impl Into<ElementKind>,
    attributes: impl IntoIterator<Item = (K, V)>,
    children: impl IntoIterator<Item = C>,
) -> Element
where
    K: Into<String>,
    V: Into<AttrValue>,
    C: Into<Child>,
{
    let props = Props {
        attributes: attributes
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect(),
        children: children.into_iter().map(|child| child.into().0).collect(),
    };
    Element {
        kind: kind.into(),
        props: Rc::new(props),
    }
}

pub fn create_text_element(value: impl Into<AttrValue>) -> Element {
    Element {
        kind: ElementKind::Text,
        props: Rc::new(Props::new().with_attribute(TEXT_VALUE, value)),
    }
}

/// Shorthand for [`create_element`] without attributes.
pub fn h(kind: impl Into<ElementKind>) -> Element {
    Element::new(kind)
}
