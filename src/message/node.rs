//! The generic container shared by every level of the message tree.
//!
//! Segments, fields, repetitions and components are all the same shape: an ordered, never
//! empty list of children one level down, separated by a delimiter on the wire. [`Node`] is
//! that shape; a [`Level`] marker decides the child type and which delimiters apply.
//!
//! | alias                | level               | children               | separator    |
//! |----------------------|---------------------|------------------------|--------------|
//! | [`Segment`]          | [`SegmentLevel`]    | [`Field`]              | field        |
//! | [`Repetitions`]      | [`FieldLevel`]      | [`Repetition`]         | repetition   |
//! | [`Repetition`]       | [`RepetitionLevel`] | [`Component`]          | component    |
//! | [`Component`]        | [`ComponentLevel`]  | [`SubComponent`]       | subcomponent |
use std::fmt::Debug;

use super::{Encoding, Field, SubComponent};

/// Read and replace the scalar value of any element.
pub trait Value {
    /// Scalar value of the element. Containers report their first child only.
    fn value(&self) -> &str;

    fn set_value(&mut self, value: &str);
}

/// Anything that can sit inside a [`Node`].
pub trait Element: Value + Default + Clone + Debug + PartialEq {
    /// Build an element holding a single literal value.
    fn from_value(value: &str) -> Self;

    /// Parse wire text that has already been split out of the parent.
    fn parse(text: &str, enc: &Encoding) -> Self;

    /// Append the wire form of this element, followed by its terminator, to `out`.
    fn encode_into(&self, out: &mut String, enc: &Encoding);

    /// Structural equality against a literal.
    fn matches(&self, literal: &str) -> bool;

    fn is_empty(&self) -> bool {
        self.matches("")
    }
}

/// A nesting level of the tree.
pub trait Level: Debug + Clone + PartialEq {
    type Child: Element;

    /// Delimiter between the children of this level.
    fn delimiter(enc: &Encoding) -> char;

    /// Delimiter written after a node of this level.
    fn terminator(enc: &Encoding) -> char;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentLevel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldLevel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepetitionLevel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentLevel;

impl Level for SegmentLevel {
    type Child = Field;

    fn delimiter(enc: &Encoding) -> char {
        enc.field
    }

    fn terminator(enc: &Encoding) -> char {
        enc.segment
    }
}

impl Level for FieldLevel {
    type Child = Repetition;

    fn delimiter(enc: &Encoding) -> char {
        enc.repetition
    }

    fn terminator(enc: &Encoding) -> char {
        enc.field
    }
}

impl Level for RepetitionLevel {
    type Child = Component;

    fn delimiter(enc: &Encoding) -> char {
        enc.component
    }

    fn terminator(enc: &Encoding) -> char {
        enc.repetition
    }
}

impl Level for ComponentLevel {
    type Child = SubComponent;

    fn delimiter(enc: &Encoding) -> char {
        enc.sub_component
    }

    fn terminator(enc: &Encoding) -> char {
        enc.component
    }
}

/// A line of the message; field 0 is the segment type.
pub type Segment = Node<SegmentLevel>;
/// The repetitions carried by an ordinary [`Field`].
pub type Repetitions = Node<FieldLevel>;
pub type Repetition = Node<RepetitionLevel>;
pub type Component = Node<ComponentLevel>;

/// Ordered, never empty list of children one level down the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<L: Level> {
    children: Vec<L::Child>,
}

impl<L: Level> Default for Node<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Level> Node<L> {
    /// A node holding one empty child.
    pub fn new() -> Self {
        Self {
            children: vec![L::Child::default()],
        }
    }

    /// Number of children. Never zero.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, L::Child> {
        self.children.iter()
    }

    /// Child at a 1-based `index`, without growing.
    pub fn get(&self, index: usize) -> Option<&L::Child> {
        index.checked_sub(1).and_then(|i| self.children.get(i))
    }

    /// Child at a 1-based `index`, appending empty children until it exists.
    ///
    /// # Panics
    /// If `index` is 0.
    pub fn child(&mut self, index: usize) -> &mut L::Child {
        assert!(index > 0, "1-based index must be at least 1");
        self.child_at(index - 1)
    }

    /// Child at a 0-based `index`, appending empty children until it exists.
    pub fn child_at(&mut self, index: usize) -> &mut L::Child {
        if self.children.len() <= index {
            self.children.resize_with(index + 1, L::Child::default);
        }
        &mut self.children[index]
    }

    pub(crate) fn insert(&mut self, index: usize, child: L::Child) {
        self.children.insert(index, child);
    }
}

impl<L: Level> Value for Node<L> {
    fn value(&self) -> &str {
        // only the first child is consulted; anything after it is ignored
        self.children.first().map_or("", |c| c.value())
    }

    /// Assigning to a node with several children collapses it to a single child.
    fn set_value(&mut self, value: &str) {
        if let [only] = self.children.as_mut_slice() {
            only.set_value(value);
        } else {
            self.children.clear();
            self.children.push(L::Child::from_value(value));
        }
    }
}

impl<L: Level> Element for Node<L> {
    fn from_value(value: &str) -> Self {
        Self {
            children: vec![L::Child::from_value(value)],
        }
    }

    fn parse(text: &str, enc: &Encoding) -> Self {
        let mut children = enc
            .split(text, L::delimiter(enc))
            .into_iter()
            .map(|piece| L::Child::parse(piece, enc))
            .collect::<Vec<_>>();
        if children.is_empty() {
            children.push(L::Child::default());
        }
        Self { children }
    }

    /// Children are written in order, each followed by this level's delimiter. Up to
    /// `self.len()` trailing delimiters are then dropped from `out` before the terminator is
    /// appended, so empty trailing children leave nothing behind.
    fn encode_into(&self, out: &mut String, enc: &Encoding) {
        for child in &self.children {
            child.encode_into(out, enc);
        }

        let delimiter = L::delimiter(enc);
        let mut trimmed = 0;
        while trimmed < self.children.len() && out.ends_with(delimiter) {
            out.pop();
            trimmed += 1;
        }

        out.push(L::terminator(enc));
    }

    /// An empty literal needs every child empty. Anything else needs the first child to match
    /// and every other child to be empty.
    fn matches(&self, literal: &str) -> bool {
        let mut children = self.children.iter();
        if literal.is_empty() {
            return children.all(|c| c.is_empty());
        }

        match children.next() {
            Some(first) => first.matches(literal) && children.all(|c| c.is_empty()),
            None => false,
        }
    }
}

impl Repetition {
    /// Component at a 1-based `index`.
    pub fn component(&mut self, index: usize) -> &mut Component {
        self.child(index)
    }

    pub fn sub_component(&mut self, component: usize, index: usize) -> &mut SubComponent {
        self.component(component).sub_component(index)
    }
}

impl Component {
    /// Subcomponent at a 1-based `index`.
    pub fn sub_component(&mut self, index: usize) -> &mut SubComponent {
        self.child(index)
    }
}
