pub mod core {
    pub mod entity;
    pub mod identifiers;
}

pub mod documents;

pub mod pagination {
    pub mod cursor;
}

pub mod records {
    pub mod chunk;
    pub mod target;
}
