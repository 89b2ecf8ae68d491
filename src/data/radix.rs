//! Mixed-radix enumeration of index tuples.

/// Iterator over every tuple `t` with `0 <= t[k] < bounds[k]`, last
/// position varying fastest.
///
/// An empty bound list yields exactly one empty tuple. Any zero bound
/// yields nothing.
#[derive(Debug, Clone)]
pub struct RadixProduct {
    bounds: Vec<usize>,
    current: Option<Vec<usize>>,
}

/// Enumerate the cartesian product of `0..b` for each `b` in `bounds`.
pub fn radix_product(bounds: &[usize]) -> RadixProduct {
    let current = if bounds.iter().any(|&b| b == 0) {
        None
    } else {
        Some(vec![0; bounds.len()])
    };
    RadixProduct {
        bounds: bounds.to_vec(),
        current,
    }
}

impl Iterator for RadixProduct {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let out = self.current.take()?;

        let mut next = out.clone();
        let mut position = next.len();
        let mut carried = true;
        while carried && position > 0 {
            position -= 1;
            next[position] += 1;
            if next[position] == self.bounds[position] {
                next[position] = 0;
            } else {
                carried = false;
            }
        }
        if !carried {
            self.current = Some(next);
        }

        Some(out)
    }
}
