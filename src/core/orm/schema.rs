//! Table layout shared by every shard database
//!
//! Registry tables keyed by global id (`registry_users`, `registry_orgs`,
//! `registry_invites`, `registry_requests`) are only written on group 0 shard 0.
//! The local registries (`registry_org_stores`, `registry_object_users`,
//! `registry_user_objects`, `registry_object_templates`) live on the shard of the
//! entity named first in their key. Ids are stored as INTEGER holding the u64
//! bit pattern.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    username    TEXT NOT NULL UNIQUE,
    email       TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL DEFAULT '',
    ciphertext  BLOB NOT NULL,
    id_creator  INTEGER NOT NULL,
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    modified    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS orgs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    alias       TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL DEFAULT '',
    id_creator  INTEGER NOT NULL,
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    modified    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS stores (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    id_org      INTEGER NOT NULL,
    alias       TEXT NOT NULL,
    name        TEXT NOT NULL DEFAULT '',
    id_creator  INTEGER NOT NULL,
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    modified    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (id_org, alias)
);

CREATE TABLE IF NOT EXISTS objects (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    id_store    INTEGER NOT NULL,
    id_parent   INTEGER NOT NULL DEFAULT 0,
    type        INTEGER NOT NULL,
    title       TEXT NOT NULL,
    object      BLOB,
    id_creator  INTEGER NOT NULL,
    id_modifier INTEGER NOT NULL,
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    modified    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS objects_parent ON objects (id_store, id_parent);

CREATE TABLE IF NOT EXISTS templates (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    version     INTEGER NOT NULL,
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    model       TEXT NOT NULL,
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (name, version)
);

CREATE TABLE IF NOT EXISTS invites (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    uid         TEXT NOT NULL UNIQUE,
    id_creator  INTEGER NOT NULL,
    invitee     TEXT NOT NULL,
    id_object   INTEGER NOT NULL,
    message     TEXT NOT NULL DEFAULT '',
    id_key      INTEGER,
    expiration  TEXT NOT NULL,
    roles       TEXT NOT NULL DEFAULT '',
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS requests (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    guid        TEXT NOT NULL UNIQUE,
    type        TEXT NOT NULL,
    id_object   INTEGER,
    parameters  TEXT NOT NULL DEFAULT '{}',
    properties  TEXT NOT NULL DEFAULT '{}',
    expiration  TEXT,
    id_creator  INTEGER NOT NULL,
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS actions (
    guid        TEXT PRIMARY KEY,
    parent      TEXT,
    type        TEXT NOT NULL,
    parameters  TEXT NOT NULL DEFAULT '{}',
    properties  TEXT NOT NULL DEFAULT '{}',
    state       INTEGER NOT NULL DEFAULT 0,
    id_creator  INTEGER NOT NULL,
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    modified    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS ciphers (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    ciphertext  BLOB NOT NULL,
    expiration  TEXT,
    id_creator  INTEGER NOT NULL,
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS registry_users (
    id          INTEGER PRIMARY KEY,
    username    TEXT NOT NULL UNIQUE,
    email       TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL DEFAULT '',
    state       INTEGER NOT NULL DEFAULT 0,
    ciphertext  BLOB NOT NULL,
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    modified    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS registry_orgs (
    id          INTEGER PRIMARY KEY,
    alias       TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL DEFAULT '',
    state       INTEGER NOT NULL DEFAULT 0,
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    modified    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS registry_org_stores (
    id_org      INTEGER NOT NULL,
    id_store    INTEGER NOT NULL,
    alias       TEXT NOT NULL,
    state       INTEGER NOT NULL DEFAULT 0,
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    modified    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (id_org, id_store),
    UNIQUE (id_org, alias)
);

CREATE TABLE IF NOT EXISTS registry_object_users (
    id_object   INTEGER NOT NULL,
    id_user     INTEGER NOT NULL,
    alias       TEXT NOT NULL DEFAULT '',
    state       INTEGER NOT NULL DEFAULT 0,
    roles       TEXT NOT NULL DEFAULT '',
    mgr_roles   INTEGER NOT NULL DEFAULT 0,
    mgr_invites INTEGER NOT NULL DEFAULT 0,
    store_key   BLOB,
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    modified    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (id_object, id_user)
);

CREATE TABLE IF NOT EXISTS registry_user_objects (
    id_user     INTEGER NOT NULL,
    id_object   INTEGER NOT NULL,
    type        INTEGER NOT NULL,
    alias       TEXT NOT NULL DEFAULT '',
    favorite    INTEGER NOT NULL DEFAULT 0,
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (id_user, id_object)
);

CREATE TABLE IF NOT EXISTS registry_object_templates (
    id_object   INTEGER NOT NULL,
    template    TEXT NOT NULL,
    title       TEXT NOT NULL,
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (id_object, template)
);

CREATE TABLE IF NOT EXISTS registry_invites (
    uid         TEXT PRIMARY KEY,
    id          INTEGER NOT NULL,
    id_object   INTEGER NOT NULL,
    invitee     TEXT NOT NULL,
    state       INTEGER NOT NULL DEFAULT 0,
    expiration  TEXT NOT NULL,
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS registry_requests (
    guid        TEXT PRIMARY KEY,
    id          INTEGER NOT NULL,
    type        TEXT NOT NULL,
    id_object   INTEGER,
    state       INTEGER NOT NULL DEFAULT 0,
    expiration  TEXT,
    created     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS registry_requests_object ON registry_requests (type, id_object);
"#;
