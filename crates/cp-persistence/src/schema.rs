//! Esquema Diesel (mantenido a mano, equivalente a `diesel print-schema`).
//!
//! Tablas:
//! - `diffs`: una fila por revisión rastreada y su estado en el pipeline.
//! - `report_sources`: fuentes adjuntas a una submission; FK con ON DELETE
//!   CASCADE hacia `diffs.submission_id`.
//!
//! Los textos que deben ordenar/comparar byte a byte (títulos, usuarios) son
//! VARBINARY; los sellos de tiempo son BINARY(14) en forma `YYYYMMDDHHMMSS`
//! y los UUID van como su forma canónica de 36 caracteres.

diesel::table! {
    diffs (diff_id) {
        diff_id -> Unsigned<Integer>,
        project -> Binary,
        lang -> Binary,
        page_namespace -> Integer,
        page_title -> Binary,
        rev_id -> Unsigned<Integer>,
        rev_parent_id -> Unsigned<Integer>,
        rev_timestamp -> Binary,
        rev_user_text -> Binary,
        submission_id -> Nullable<Binary>,
        status -> TinyInt,
        status_timestamp -> Nullable<Binary>,
        status_user_text -> Nullable<Binary>,
    }
}

diesel::table! {
    report_sources (source_id) {
        source_id -> Unsigned<Integer>,
        submission_id -> Binary,
        description -> Binary,
        url -> Nullable<Binary>,
        percent -> Float,
    }
}

diesel::allow_tables_to_appear_in_same_query!(diffs, report_sources);
