//! Built-in ODRL 2.2 vocabulary.
//!
//! Namespaces, the terms of the ODRL core and common vocabularies, and the
//! context IRIs that are understood without fetching.

/// The ODRL namespace.
pub const ODRL_NS: &str = "http://www.w3.org/ns/odrl/2/";

/// The XML Schema datatypes namespace.
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";

/// The RDF namespace.
pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// The RDF Schema namespace.
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";

/// The Dublin Core terms namespace.
pub const DCT_NS: &str = "http://purl.org/dc/terms/";

/// Context documents whose content is the built-in ODRL vocabulary.
pub const ODRL_CONTEXTS: &[&str] = &[
    "http://www.w3.org/ns/odrl.jsonld",
    "https://www.w3.org/ns/odrl.jsonld",
    "http://www.w3.org/ns/odrl/2/",
];

/// Prefixes available for compact IRIs.
pub const PREFIXES: &[(&str, &str)] = &[
    ("odrl", ODRL_NS),
    ("xsd", XSD_NS),
    ("rdf", RDF_NS),
    ("rdfs", RDFS_NS),
    ("dct", DCT_NS),
];

/// Policy classes.
pub const POLICY_CLASSES: &[&str] = &[
    "Policy",
    "Set",
    "Offer",
    "Agreement",
    "Request",
    "Ticket",
    "Assertion",
    "Privacy",
];

/// Other classes of the information model.
pub const CLASSES: &[&str] = &[
    "Party",
    "PartyCollection",
    "Asset",
    "AssetCollection",
    "Rule",
    "Permission",
    "Prohibition",
    "Duty",
    "Action",
    "Constraint",
    "LogicalConstraint",
    "LeftOperand",
    "RightOperand",
    "Operator",
    "ConflictTerm",
];

/// Properties of the information model.
pub const PROPERTIES: &[&str] = &[
    "permission",
    "prohibition",
    "obligation",
    "duty",
    "remedy",
    "consequence",
    "action",
    "assigner",
    "assignee",
    "target",
    "constraint",
    "refinement",
    "leftOperand",
    "operator",
    "rightOperand",
    "rightOperandReference",
    "dataType",
    "unit",
    "status",
    "conflict",
    "inheritFrom",
    "profile",
    "partOf",
    "source",
    "assignerOf",
    "assigneeOf",
    "hasPolicy",
    "includedIn",
    "implies",
];

/// Actions of the ODRL core and common vocabularies.
pub const ACTIONS: &[&str] = &[
    "use",
    "transfer",
    "acceptTracking",
    "aggregate",
    "annotate",
    "anonymize",
    "archive",
    "attribute",
    "compensate",
    "concurrentUse",
    "delete",
    "derive",
    "digitize",
    "display",
    "distribute",
    "ensureExclusivity",
    "execute",
    "extract",
    "give",
    "grantUse",
    "include",
    "index",
    "inform",
    "install",
    "modify",
    "move",
    "nextPolicy",
    "obtainConsent",
    "play",
    "present",
    "print",
    "read",
    "reproduce",
    "reviewPolicy",
    "sell",
    "stream",
    "synchronize",
    "textToSpeech",
    "transform",
    "translate",
    "uninstall",
    "watermark",
];

/// Left operands.
pub const LEFT_OPERANDS: &[&str] = &[
    "absolutePosition",
    "absoluteSpatialPosition",
    "absoluteTemporalPosition",
    "absoluteSize",
    "count",
    "dateTime",
    "delayPeriod",
    "deliveryChannel",
    "elapsedTime",
    "event",
    "fileFormat",
    "industry",
    "language",
    "media",
    "meteredTime",
    "payAmount",
    "percentage",
    "product",
    "purpose",
    "recipient",
    "relativePosition",
    "relativeSpatialPosition",
    "relativeTemporalPosition",
    "relativeSize",
    "resolution",
    "spatial",
    "spatialCoordinates",
    "systemDevice",
    "timeInterval",
    "unit",
    "version",
    "virtualLocation",
];

/// Constraint operators.
pub const OPERATORS: &[&str] = &[
    "eq", "gt", "gteq", "lt", "lteq", "neq", "isA", "hasPart", "isPartOf", "isAllOf", "isAnyOf",
    "isNoneOf",
];

/// Logical constraint operators.
pub const LOGICAL_OPERATORS: &[&str] = &["and", "or", "xone", "andSequence"];

/// Conflict strategy terms.
pub const CONFLICT_TERMS: &[&str] = &["perm", "prohibit", "invalid"];

/// Iterate over every ODRL term defined by the built-in vocabulary.
pub fn terms() -> impl Iterator<Item = &'static str> {
    POLICY_CLASSES
        .iter()
        .chain(CLASSES)
        .chain(PROPERTIES)
        .chain(ACTIONS)
        .chain(LEFT_OPERANDS)
        .chain(OPERATORS)
        .chain(LOGICAL_OPERATORS)
        .chain(CONFLICT_TERMS)
        .copied()
}

/// Check whether a context IRI names the built-in ODRL context.
pub fn is_odrl_context(iri: &str) -> bool {
    ODRL_CONTEXTS.contains(&iri)
}
