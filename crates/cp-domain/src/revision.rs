//! Contenido de una revisión tal como lo devuelve la API del wiki.

/// Revisión con contenido del slot principal y metadatos de auditoría.
#[derive(Debug, Clone, Default)]
pub struct RevisionData {
    pub rev_id: u32,
    pub text: String,
    pub comment: String,
    /// El resumen de edición fue suprimido por un administrador.
    pub comment_hidden: bool,
    pub tags: Vec<String>,
    pub user: String,
}

impl RevisionData {
    /// La revisión es una reversión según sus etiquetas de cambio: rollback,
    /// o cualquiera de las etiquetas de deshacer.
    pub fn is_revert(&self) -> bool {
        let has = |tag: &str| self.tags.iter().any(|t| t == tag);
        has("mw-rollback") || has("mw-undo") || has("twinkle")
    }

    /// La revisión fue posteriormente revertida.
    pub fn was_reverted(&self) -> bool {
        self.tags.iter().any(|t| t == "mw-reverted")
    }
}
