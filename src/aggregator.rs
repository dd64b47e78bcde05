//! # Agregador — Batches → ResultSet
//!
//! Junta as seções devolvidas por cada batch em um único [`ResultSet`]:
//!
//! ```text
//! [(Part 1, [A, B]), (Part 2, [C])]  →  ResultSet [A, B, C]
//! ```
//!
//! - A ordem é a ordem dos batches (= ordem das páginas), e dentro de um
//!   batch a ordem recebida. Nada é reordenado por conteúdo.
//! - Seção sem `page_ref` recebe a faixa da sua parte (`"Pages 11-20"`).
//! - Métricas inválidas são filtradas aqui também, para que nenhuma entre
//!   no resultado mesmo que o chamador esqueça de validar.
//! - **Não há deduplicação** entre batches: a mesma métrica vista em duas
//!   partes aparece duas vezes.

use crate::core::{ResultSet, Section};
use crate::pdf::Part;
use crate::validator::sanitize_sections;

/// Valida e completa as seções de um batch. Idempotente.
pub fn resolve_batch(part: &Part, sections: Vec<Section>) -> Vec<Section> {
    sanitize_sections(sections)
        .into_iter()
        .map(|mut section| {
            let missing = section
                .page_ref
                .as_deref()
                .map(|p| p.trim().is_empty())
                .unwrap_or(true);
            if missing {
                section.page_ref = Some(part.page_ref());
            }
            section
        })
        .collect()
}

/// Concatena os batches, na ordem recebida, em um [`ResultSet`].
pub fn aggregate(batches: Vec<(Part, Vec<Section>)>) -> ResultSet {
    debug_assert!(
        batches.windows(2).all(|w| w[0].0.start_page <= w[1].0.start_page),
        "batches must arrive in page order"
    );
    let sections = batches
        .into_iter()
        .flat_map(|(part, sections)| resolve_batch(&part, sections))
        .collect();
    ResultSet::new(sections)
}
