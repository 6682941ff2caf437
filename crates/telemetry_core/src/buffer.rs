//! Buffers de capacidade fixa.
//!
//! Sem crescimento dinâmico: escrever além da capacidade é erro de
//! construção ([`CapacityExceeded`]) e o conteúdo anterior fica intacto.

use std::fmt;

/// Capacidade do buffer do payload JSON.
pub const PAYLOAD_CAPACITY: usize = 1024;
/// Capacidade da requisição HTTP (cabeçalhos + payload cheio).
pub const REQUEST_CAPACITY: usize = PAYLOAD_CAPACITY + 512;
/// Capacidade do único chunk de resposta lido por ciclo.
pub const RESPONSE_CAPACITY: usize = 1024;

pub type PayloadBuffer = FixedBuffer<PAYLOAD_CAPACITY>;
pub type RequestBuffer = FixedBuffer<REQUEST_CAPACITY>;
pub type ResponseBuffer = FixedBuffer<RESPONSE_CAPACITY>;

/// Conteúdo não cabe no buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("capacidade excedida: {needed} bytes necessários, {capacity} disponíveis")]
pub struct CapacityExceeded {
    pub needed: usize,
    pub capacity: usize,
}

/// Buffer de bytes com capacidade `N` fixada em tempo de compilação.
#[derive(Clone)]
pub struct FixedBuffer<const N: usize> {
    data: [u8; N],
    len: usize,
}

impl<const N: usize> Default for FixedBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for FixedBuffer<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedBuffer")
            .field("len", &self.len)
            .field("capacity", &N)
            .finish()
    }
}

impl<const N: usize> FixedBuffer<N> {
    pub const fn new() -> Self {
        Self { data: [0; N], len: 0 }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> usize {
        N - self.len
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Conteúdo como texto (bytes inválidos viram U+FFFD).
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    /// Acrescenta `bytes` inteiro ou nada.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<(), CapacityExceeded> {
        let end = self.len + bytes.len();
        if end > N {
            return Err(CapacityExceeded {
                needed: end,
                capacity: N,
            });
        }
        self.data[self.len..end].copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }

    /// Acrescenta texto formatado inteiro ou nada.
    ///
    /// Em caso de estouro, `needed` informa o tamanho total que seria
    /// necessário, não só até o ponto em que faltou espaço.
    pub fn write_formatted(&mut self, args: fmt::Arguments<'_>) -> Result<(), CapacityExceeded> {
        struct Sink<'a> {
            buf: &'a mut [u8],
            needed: usize,
        }

        impl fmt::Write for Sink<'_> {
            fn write_str(&mut self, s: &str) -> fmt::Result {
                let end = self.needed + s.len();
                if end <= self.buf.len() {
                    self.buf[self.needed..end].copy_from_slice(s.as_bytes());
                }
                self.needed = end;
                Ok(())
            }
        }

        let start = self.len;
        let mut sink = Sink {
            buf: &mut self.data[start..],
            needed: 0,
        };
        // O sink nunca falha; um erro aqui viria de um `Display` alheio.
        let _ = fmt::write(&mut sink, args);

        let end = start + sink.needed;
        if end > N {
            return Err(CapacityExceeded {
                needed: end,
                capacity: N,
            });
        }
        self.len = end;
        Ok(())
    }

    /// Espaço livre para uma leitura direta; confirme com [`commit`](Self::commit).
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.len..]
    }

    /// Marca `n` bytes de [`spare_mut`](Self::spare_mut) como preenchidos.
    pub fn commit(&mut self, n: usize) {
        self.len = (self.len + n).min(N);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_is_all_or_nothing() {
        let mut buf = FixedBuffer::<8>::new();
        buf.extend_from_slice(b"abcde").unwrap();
        let err = buf.extend_from_slice(b"fghi").unwrap_err();
        assert_eq!(err, CapacityExceeded { needed: 9, capacity: 8 });
        assert_eq!(buf.as_bytes(), b"abcde");
        buf.extend_from_slice(b"fgh").unwrap();
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn formatted_overflow_reports_full_size_and_keeps_content() {
        let mut buf = FixedBuffer::<10>::new();
        buf.write_formatted(format_args!("ok:")).unwrap();
        let err = buf
            .write_formatted(format_args!("{}-{}", "abcdef", 123456))
            .unwrap_err();
        assert_eq!(err.needed, 3 + 13);
        assert_eq!(buf.as_bytes(), b"ok:");
    }

    #[test]
    fn formatted_fits_exactly() {
        let mut buf = FixedBuffer::<5>::new();
        buf.write_formatted(format_args!("{:.2}", 1.5_f32)).unwrap();
        assert_eq!(buf.as_bytes(), b"1.50");
        buf.write_formatted(format_args!("!")).unwrap();
        assert_eq!(buf.len(), buf.capacity());
    }

    #[test]
    fn spare_and_commit() {
        let mut buf = FixedBuffer::<4>::new();
        buf.spare_mut()[..2].copy_from_slice(b"hi");
        buf.commit(2);
        assert_eq!(buf.to_text(), "hi");
        buf.clear();
        assert!(buf.is_empty());
    }
}
