use anyhow::Result;

/// Calculate cosine similarity between two embedding vectors
/// Returns value between -1.0 (opposite) and 1.0 (identical)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        anyhow::bail!("Vector dimensions must match: {} != {}", a.len(), b.len());
    }

    if a.is_empty() {
        anyhow::bail!("Vectors cannot be empty");
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();

    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    // Clamp to [-1, 1] to absorb floating point drift
    Ok((dot_product / (magnitude_a * magnitude_b)).clamp(-1.0, 1.0))
}
