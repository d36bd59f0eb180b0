//! Unified diff between original and fixed text

use std::path::Path;

const CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Keep,
    Remove,
    Add,
}

/// Line operations turning `a` into `b`, from a longest common subsequence
fn edit_script(a: &[&str], b: &[&str]) -> Vec<(Op, usize, usize)> {
    let (n, m) = (a.len(), b.len());
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n || j < m {
        if i < n && j < m && a[i] == b[j] {
            ops.push((Op::Keep, i, j));
            i += 1;
            j += 1;
        } else if i < n && (j == m || lcs[i + 1][j] >= lcs[i][j + 1]) {
            ops.push((Op::Remove, i, j));
            i += 1;
        } else {
            ops.push((Op::Add, i, j));
            j += 1;
        }
    }
    ops
}

/// Generate a unified diff; empty when the texts are equal
pub fn unified_diff(file: &Path, original: &str, modified: &str) -> String {
    if original == modified {
        return String::new();
    }

    let a: Vec<&str> = original.lines().collect();
    let b: Vec<&str> = modified.lines().collect();
    let ops = edit_script(&a, &b);

    let mut diff = String::new();
    diff.push_str(&format!("--- a/{}\n", file.display()));
    diff.push_str(&format!("+++ b/{}\n", file.display()));

    let changes: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, (op, _, _))| *op != Op::Keep)
        .map(|(k, _)| k)
        .collect();

    let mut k = 0;
    while k < changes.len() {
        let start = changes[k].saturating_sub(CONTEXT);
        let mut end = changes[k];
        while k < changes.len() && changes[k] <= end + 2 * CONTEXT {
            end = changes[k];
            k += 1;
        }
        let end = (end + CONTEXT + 1).min(ops.len());
        let hunk = &ops[start..end];

        let (_, a_start, b_start) = hunk[0];
        let a_len = hunk.iter().filter(|(op, _, _)| *op != Op::Add).count();
        let b_len = hunk.iter().filter(|(op, _, _)| *op != Op::Remove).count();
        diff.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            if a_len == 0 { a_start } else { a_start + 1 },
            a_len,
            if b_len == 0 { b_start } else { b_start + 1 },
            b_len
        ));
        for (op, i, j) in hunk {
            let line = match op {
                Op::Keep => format!(" {}", a[*i]),
                Op::Remove => format!("-{}", a[*i]),
                Op::Add => format!("+{}", b[*j]),
            };
            diff.push_str(&line);
            diff.push('\n');
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_equal_texts_have_no_diff() {
        assert_eq!(unified_diff(Path::new("A.cs"), "x\ny\n", "x\ny\n"), "");
    }

    #[test]
    fn test_insertion() {
        let original = "class H\n{\n}\n";
        let modified = "class H\n{\n    void Handle() { }\n}\n";
        let expected = "--- a/H.cs
+++ b/H.cs
@@ -1,3 +1,4 @@
 class H
 {
+    void Handle() { }
 }
";
        assert_eq!(unified_diff(Path::new("H.cs"), original, modified), expected);
    }

    #[test]
    fn test_replacement_keeps_distant_hunks_apart() {
        let original: String = (1..=20).map(|i| format!("line {}\n", i)).collect();
        let modified = original
            .replace("line 2\n", "line two\n")
            .replace("line 18\n", "line eighteen\n");
        let diff = unified_diff(Path::new("L.cs"), &original, &modified);
        assert_eq!(diff.matches("@@ -").count(), 2);
        assert!(diff.contains("@@ -1,5 +1,5 @@\n line 1\n-line 2\n+line two\n line 3\n"));
        assert!(diff.contains("-line 18\n+line eighteen\n"));
        assert!(!diff.contains(" line 10\n"));
    }
}
