//! Store compartilhado de telemetria.
//!
//! Um único [`TelemetrySnapshot`] atrás de um único `Mutex`. Produtores
//! escrevem seu grupo de campos com espera limitada (um update perdido é
//! descartado); o reporter copia o snapshot inteiro com espera ilimitada.
//! Nenhuma referência aos campos internos escapa da seção crítica.

use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use crate::types::{ClimateReading, LightLevel, MotionReading, SoundLevel, TelemetrySnapshot, VocIndex};

/// Intervalo entre tentativas de `try_lock` durante uma espera limitada.
const LOCK_POLL: Duration = Duration::from_micros(250);

/// Adquire `mutex` esperando no máximo `wait` (`None` = sem limite).
///
/// Lock envenenado é recuperado: quem segura o lock só faz atribuições
/// simples de campos, então o valor protegido nunca fica pela metade.
pub fn lock_within<T>(mutex: &Mutex<T>, wait: Option<Duration>) -> Option<MutexGuard<'_, T>> {
    let Some(wait) = wait else {
        return Some(mutex.lock().unwrap_or_else(PoisonError::into_inner));
    };

    let deadline = Instant::now() + wait;
    loop {
        match mutex.try_lock() {
            Ok(guard) => return Some(guard),
            Err(TryLockError::Poisoned(p)) => return Some(p.into_inner()),
            Err(TryLockError::WouldBlock) => {
                if Instant::now() >= deadline {
                    return None;
                }
                std::thread::sleep(LOCK_POLL);
            }
        }
    }
}

/// Grupo de campos escrito atomicamente por um produtor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldUpdate {
    Climate(ClimateReading),
    Voc(VocIndex),
    Light(LightLevel),
    Sound(SoundLevel),
    Motion(MotionReading),
}

impl FieldUpdate {
    /// Nome curto do grupo, para logs.
    pub fn group(&self) -> &'static str {
        match self {
            FieldUpdate::Climate(_) => "climate",
            FieldUpdate::Voc(_) => "voc",
            FieldUpdate::Light(_) => "light",
            FieldUpdate::Sound(_) => "sound",
            FieldUpdate::Motion(_) => "motion",
        }
    }

    fn apply(self, snapshot: &mut TelemetrySnapshot) {
        match self {
            FieldUpdate::Climate(c) => {
                snapshot.temperature = c.temperature;
                snapshot.humidity = c.humidity;
            }
            FieldUpdate::Voc(v) => snapshot.voc = v.0,
            FieldUpdate::Light(l) => snapshot.light = l.get(),
            FieldUpdate::Sound(s) => snapshot.sound = s.get(),
            FieldUpdate::Motion(m) => {
                snapshot.accelerometer = m.accelerometer;
                snapshot.gyroscope = m.gyroscope;
            }
        }
    }
}

impl From<ClimateReading> for FieldUpdate {
    fn from(r: ClimateReading) -> Self {
        FieldUpdate::Climate(r)
    }
}

impl From<VocIndex> for FieldUpdate {
    fn from(r: VocIndex) -> Self {
        FieldUpdate::Voc(r)
    }
}

impl From<LightLevel> for FieldUpdate {
    fn from(r: LightLevel) -> Self {
        FieldUpdate::Light(r)
    }
}

impl From<SoundLevel> for FieldUpdate {
    fn from(r: SoundLevel) -> Self {
        FieldUpdate::Sound(r)
    }
}

impl From<MotionReading> for FieldUpdate {
    fn from(r: MotionReading) -> Self {
        FieldUpdate::Motion(r)
    }
}

/// Update abandonado por timeout do lock. Não fatal: o valor anterior fica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("store ocupado: update de '{group}' descartado após {waited:?}")]
pub struct StoreMiss {
    pub group: &'static str,
    pub waited: Duration,
}

/// Registro compartilhado entre produtores e reporter.
#[derive(Debug, Default)]
pub struct SharedTelemetryStore {
    inner: Mutex<TelemetrySnapshot>,
}

impl SharedTelemetryStore {
    /// Cria o store com todos os campos zerados.
    pub fn new() -> Self {
        Self::default()
    }

    /// Escreve o grupo inteiro ou nada, esperando no máximo `wait` pelo lock.
    pub fn update(&self, update: FieldUpdate, wait: Duration) -> Result<(), StoreMiss> {
        match lock_within(&self.inner, Some(wait)) {
            Some(mut snapshot) => {
                update.apply(&mut snapshot);
                Ok(())
            }
            None => Err(StoreMiss {
                group: update.group(),
                waited: wait,
            }),
        }
    }

    /// Copia todos os campos sob o lock (espera ilimitada).
    pub fn snapshot(&self) -> TelemetrySnapshot {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Axes;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    const WAIT: Duration = Duration::from_millis(100);

    #[test]
    fn new_store_is_zeroed() {
        let store = SharedTelemetryStore::new();
        assert_eq!(store.snapshot(), TelemetrySnapshot::default());
    }

    #[test]
    fn update_writes_only_its_group() {
        let store = SharedTelemetryStore::new();
        store
            .update(
                ClimateReading {
                    temperature: 22.5,
                    humidity: 48.3,
                }
                .into(),
                WAIT,
            )
            .unwrap();
        store.update(VocIndex(120).into(), WAIT).unwrap();

        let s = store.snapshot();
        assert_eq!(s.temperature, 22.5);
        assert_eq!(s.humidity, 48.3);
        assert_eq!(s.voc, 120);
        assert_eq!(s.light, 0);
        assert_eq!(s.accelerometer, Axes::default());
    }

    #[test]
    fn last_write_wins() {
        let store = SharedTelemetryStore::new();
        store.update(LightLevel::new(10).into(), WAIT).unwrap();
        store.update(LightLevel::new(300).into(), WAIT).unwrap();
        assert_eq!(store.snapshot().light, 300);
    }

    #[test]
    fn update_times_out_while_lock_is_held() {
        let store = SharedTelemetryStore::new();
        store.update(SoundLevel::new(7).into(), WAIT).unwrap();

        let guard = store.inner.lock().unwrap();
        let miss = store
            .update(SoundLevel::new(99).into(), Duration::from_millis(5))
            .unwrap_err();
        drop(guard);

        assert_eq!(miss.group, "sound");
        assert_eq!(store.snapshot().sound, 7, "valor anterior deve ser mantido");
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let store = Arc::new(SharedTelemetryStore::new());
        let s = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = s.inner.lock().unwrap();
            panic!("produtor caiu segurando o lock");
        })
        .join();

        store.update(VocIndex(5).into(), WAIT).unwrap();
        assert_eq!(store.snapshot().voc, 5);
    }

    #[test]
    fn snapshots_never_tear_grouped_fields() {
        let store = Arc::new(SharedTelemetryStore::new());
        let stop = Arc::new(AtomicBool::new(false));

        let writers: Vec<_> = (0..3)
            .map(|w| {
                let store = Arc::clone(&store);
                let stop = Arc::clone(&stop);
                std::thread::spawn(move || {
                    let mut k = 0u32;
                    while !stop.load(Ordering::Relaxed) {
                        let v = (k * 3 + w) as f32;
                        let motion = MotionReading {
                            accelerometer: Axes::new(v, v, v),
                            gyroscope: Axes::new(v, v, v),
                        };
                        let _ = store.update(motion.into(), WAIT);
                        let _ = store.update(
                            ClimateReading {
                                temperature: v,
                                humidity: v,
                            }
                            .into(),
                            WAIT,
                        );
                        k += 1;
                    }
                })
            })
            .collect();

        for _ in 0..5_000 {
            let s = store.snapshot();
            let a = s.accelerometer;
            let g = s.gyroscope;
            assert!(a.x == a.y && a.y == a.z, "acelerômetro rasgado: {a:?}");
            assert!(g.x == g.y && g.y == g.z, "giroscópio rasgado: {g:?}");
            assert_eq!(a.x, g.x, "grupo motion rasgado: {a:?} {g:?}");
            assert_eq!(s.temperature, s.humidity, "grupo climate rasgado");
        }

        stop.store(true, Ordering::Relaxed);
        for w in writers {
            w.join().unwrap();
        }
    }

    #[test]
    fn bounded_lock_helper_gives_up() {
        let m = Mutex::new(0u8);
        let _held = m.lock().unwrap();
        let start = Instant::now();
        assert!(lock_within(&m, Some(Duration::from_millis(10))).is_none());
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
