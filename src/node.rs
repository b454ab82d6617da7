use std::fmt;

/// The kind of declaration a [`ProtoNode`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The root of a package tree.
    Package,
    /// A message type, including the synthetic messages declared by groups and extend blocks.
    Message,
    /// An enum type.
    Enum,
    /// A value of an enum.
    EnumValue,
    /// A field of a message, oneof or extension.
    Field,
    /// A map field. Its only children are the `key` and `value` fields of the entry type.
    MapField,
    /// A oneof, whose children are its member fields.
    Oneof,
    /// An RPC service.
    Service,
    /// A method of a service.
    Method,
    /// The options attached to a field.
    Options,
    /// A single option name and value.
    Option,
}

/// The label of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// The `optional` label.
    Optional,
    /// The `required` label.
    Required,
    /// The `repeated` label.
    Repeated,
}

/// Flags recorded on fields and methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NodeFlags {
    /// The method takes a stream of requests.
    pub client_streaming: bool,
    /// The method returns a stream of responses.
    pub server_streaming: bool,
    /// The field was declared as a group, and is encoded with group delimiters.
    pub group: bool,
}

/// A node in a descriptor tree.
///
/// Every declaration in a schema file becomes one node. Nodes own their children, so a package
/// node owns the entire tree of types declared in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoNode {
    kind: NodeKind,
    name: String,
    children: Vec<ProtoNode>,
    number: Option<i64>,
    type_ref: Option<String>,
    response_type: Option<String>,
    label: Option<Label>,
    flags: NodeFlags,
    value: Option<String>,
    line: u32,
}

/// A node under construction, whose name is not known yet.
///
/// Container declarations such as messages collect their children before they are finally named
/// with [`finish`](NodeBuilder::finish). A builder cannot be inserted into a tree, so an unnamed
/// node is never visible to lookups.
#[derive(Debug)]
pub struct NodeBuilder {
    node: ProtoNode,
}

impl NodeKind {
    /// Returns true for kinds that describe a field on the wire.
    pub fn is_field_like(self) -> bool {
        matches!(self, NodeKind::Field | NodeKind::MapField)
    }

    fn as_str(self) -> &'static str {
        match self {
            NodeKind::Package => "package",
            NodeKind::Message => "message",
            NodeKind::Enum => "enum",
            NodeKind::EnumValue => "value",
            NodeKind::Field => "field",
            NodeKind::MapField => "map",
            NodeKind::Oneof => "oneof",
            NodeKind::Service => "service",
            NodeKind::Method => "rpc",
            NodeKind::Options => "options",
            NodeKind::Option => "option",
        }
    }
}

impl Label {
    fn as_str(self) -> &'static str {
        match self {
            Label::Optional => "optional",
            Label::Required => "required",
            Label::Repeated => "repeated",
        }
    }
}

impl ProtoNode {
    /// Starts building a node of the given kind.
    pub fn builder(kind: NodeKind) -> NodeBuilder {
        NodeBuilder {
            node: ProtoNode {
                kind,
                name: String::new(),
                children: Vec::new(),
                number: None,
                type_ref: None,
                response_type: None,
                label: None,
                flags: NodeFlags::default(),
                value: None,
                line: 0,
            },
        }
    }

    /// Creates a leaf node with the given kind and name.
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        ProtoNode::builder(kind).finish(name)
    }

    /// The kind of declaration this node represents.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The declared name. Package nodes are named with the full dotted package name, or the empty
    /// string for the default package.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The children of this node, in declaration order.
    pub fn children(&self) -> &[ProtoNode] {
        &self.children
    }

    /// The field number of a field, or the value of an enum value.
    pub fn number(&self) -> Option<i64> {
        self.number
    }

    /// The type of a field exactly as written, the request type of a method, or the message
    /// extended by an extend block.
    pub fn type_ref(&self) -> Option<&str> {
        self.type_ref.as_deref()
    }

    /// The response type of a method.
    pub fn response_type(&self) -> Option<&str> {
        self.response_type.as_deref()
    }

    /// The label of a field, if one was declared.
    pub fn label(&self) -> Option<Label> {
        self.label
    }

    /// The streaming and group flags of a method or field.
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    /// The value of an option, as text.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The 1-based line on which the node was declared.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Appends a child node.
    pub fn add_child(&mut self, child: ProtoNode) {
        self.children.push(child);
    }

    /// Moves all children of `other` to the end of this node's children, consuming `other`.
    pub fn merge_children_from(&mut self, other: ProtoNode) {
        self.children.extend(other.children);
    }

    /// Finds the first child with the given name.
    pub fn find_child_by_name(&self, name: &str) -> Option<&ProtoNode> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Finds the first child with the given number.
    pub fn find_child_by_number(&self, number: i64) -> Option<&ProtoNode> {
        self.children
            .iter()
            .find(|child| child.number == Some(number))
    }

    /// Iterates over the fields of a message or extension, including the members of its oneofs.
    pub fn fields(&self) -> impl Iterator<Item = &ProtoNode> + '_ {
        self.children.iter().flat_map(|child| {
            let members = match child.kind {
                NodeKind::Oneof => child.children.as_slice(),
                _ => std::slice::from_ref(child),
            };
            members.iter().filter(|node| node.kind.is_field_like())
        })
    }

    /// Finds the field with the given number, including the members of oneofs.
    pub fn field_by_number(&self, number: i64) -> Option<&ProtoNode> {
        self.fields().find(|field| field.number == Some(number))
    }

    /// The request type of a method.
    pub fn input_type(&self) -> Option<&str> {
        match self.kind {
            NodeKind::Method => self.type_ref(),
            _ => None,
        }
    }

    /// The response type of a method.
    pub fn output_type(&self) -> Option<&str> {
        self.response_type()
    }

    /// Gets the value of the named option attached to this field, if any.
    pub fn option(&self, name: &str) -> Option<&str> {
        self.children
            .iter()
            .filter(|child| child.kind == NodeKind::Options)
            .flat_map(|options| options.children.iter())
            .find(|option| option.kind == NodeKind::Option && option.name == name)
            .and_then(|option| option.value())
    }

    pub(crate) fn find_path<F>(&self, path: &str, mut is_match: F) -> Option<&ProtoNode>
    where
        F: FnMut(NodeKind) -> bool,
    {
        let mut components = path.split('.').peekable();
        let mut node = self;
        while let Some(name) = components.next() {
            let is_last = components.peek().is_none();
            node = node.children.iter().find(|child| {
                child.name == name
                    && if is_last {
                        is_match(child.kind)
                    } else {
                        child.kind == NodeKind::Message
                    }
            })?;
        }
        Some(node)
    }
}

impl NodeBuilder {
    /// Sets the 1-based line on which the node was declared.
    pub fn line(mut self, line: u32) -> Self {
        self.node.line = line;
        self
    }

    /// Sets the field number or enum value.
    pub fn number(mut self, number: i64) -> Self {
        self.node.number = Some(number);
        self
    }

    /// Sets the field type or method request type.
    pub fn type_ref(mut self, type_ref: impl Into<String>) -> Self {
        self.node.type_ref = Some(type_ref.into());
        self
    }

    /// Sets the method response type.
    pub fn response_type(mut self, response_type: impl Into<String>) -> Self {
        self.node.response_type = Some(response_type.into());
        self
    }

    /// Sets the field label.
    pub fn label(mut self, label: Option<Label>) -> Self {
        self.node.label = label;
        self
    }

    /// Sets the streaming and group flags.
    pub fn flags(mut self, flags: NodeFlags) -> Self {
        self.node.flags = flags;
        self
    }

    /// Sets the option value.
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.node.value = Some(value.into());
        self
    }

    /// Appends a child node.
    pub fn add_child(&mut self, child: ProtoNode) {
        self.node.children.push(child);
    }

    /// Moves all children of `other` to the end of this node's children, consuming `other`.
    pub fn merge_children_from(&mut self, other: ProtoNode) {
        self.node.merge_children_from(other);
    }

    /// The children added so far.
    pub fn children(&self) -> &[ProtoNode] {
        &self.node.children
    }

    /// Names the node, completing it.
    pub fn finish(mut self, name: impl Into<String>) -> ProtoNode {
        self.node.name = name.into();
        self.node
    }
}

impl fmt::Display for ProtoNode {
    /// Writes the tree rooted at this node, one node per line, with children indented.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

impl ProtoNode {
    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{:indent$}{}", "", self.kind.as_str(), indent = depth * 2)?;
        if self.kind == NodeKind::Method {
            let stream = |streaming| if streaming { "stream " } else { "" };
            write!(
                f,
                " {} ({}{}) returns ({}{})",
                self.name,
                stream(self.flags.client_streaming),
                self.type_ref.as_deref().unwrap_or_default(),
                stream(self.flags.server_streaming),
                self.response_type.as_deref().unwrap_or_default(),
            )?;
        } else {
            if let Some(label) = self.label {
                write!(f, " {}", label.as_str())?;
            }
            if self.flags.group {
                write!(f, " group")?;
            }
            if let Some(type_ref) = &self.type_ref {
                write!(f, " {}", type_ref)?;
            }
            match self.kind {
                NodeKind::Package if self.name.is_empty() => write!(f, " <default>")?,
                NodeKind::Options => (),
                _ => write!(f, " {}", self.name)?,
            }
        }
        if let Some(number) = self.number {
            write!(f, " = {}", number)?;
        }
        if let Some(value) = &self.value {
            write!(f, " = {}", value)?;
        }
        writeln!(f)?;

        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}
