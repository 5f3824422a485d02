use crate::reports::Summary;
use crate::messaging::format_amount;

pub fn render_index(gym_name: &str, date: &str, summary: &Summary) -> String {
    INDEX_HTML
        .replace("{{GYM}}", &escape(gym_name))
        .replace("{{DATE}}", date)
        .replace("{{ACTIVE}}", &summary.active_members.to_string())
        .replace("{{INCOME}}", &format_amount(summary.monthly_income))
        .replace("{{RATE}}", &summary.attendance_rate.to_string())
        .replace("{{PACKAGES}}", &summary.package_members.to_string())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="es">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{GYM}}</title>
  <style>
    :root {
      --bg: #1d1f24;
      --card: #262a31;
      --ink: #f8f9fa;
      --muted: #9aa0a6;
      --accent: #27f9d4;
      --warning: #f4b740;
      --danger: #ef5350;
      --ok: #4caf50;
    }

    * { box-sizing: border-box; }

    body {
      margin: 0;
      font-family: system-ui, -apple-system, "Segoe UI", sans-serif;
      background: var(--bg);
      color: var(--ink);
    }

    header {
      padding: 24px 32px;
      display: flex;
      justify-content: space-between;
      align-items: baseline;
      border-bottom: 1px solid rgba(255, 255, 255, 0.08);
    }

    header h1 { margin: 0; font-size: 1.6rem; color: var(--accent); }
    main { padding: 24px 32px; display: grid; gap: 24px; }

    .metrics {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
      gap: 16px;
    }

    .card {
      background: var(--card);
      border-radius: 12px;
      padding: 16px 20px;
    }

    .metric-label { color: var(--muted); font-size: 0.85rem; }
    .metric-value { font-size: 1.8rem; font-weight: 600; margin-top: 6px; }

    table { width: 100%; border-collapse: collapse; }
    th, td { padding: 8px 10px; text-align: left; border-bottom: 1px solid rgba(255, 255, 255, 0.06); }
    th { color: var(--muted); font-weight: 500; font-size: 0.85rem; }

    .badge { border-radius: 999px; padding: 2px 10px; font-size: 0.8rem; font-weight: 600; }
    .badge.current { background: var(--ok); }
    .badge.expiring_soon, .badge.expired_recently { background: var(--warning); color: #1d1f24; }
    .badge.expired_long, .badge.none { background: var(--danger); }

    button {
      border: none;
      border-radius: 8px;
      padding: 10px 18px;
      font-weight: 600;
      cursor: pointer;
      background: var(--accent);
      color: #1d1f24;
    }

    .status { min-height: 1.2em; color: var(--muted); }
    .status.error { color: var(--danger); }
    a { color: var(--accent); }
  </style>
</head>
<body>
  <header>
    <h1>{{GYM}}</h1>
    <span id="date">{{DATE}}</span>
  </header>
  <main>
    <section class="metrics">
      <div class="card"><div class="metric-label">Usuarios activos</div><div class="metric-value">{{ACTIVE}}</div></div>
      <div class="card"><div class="metric-label">Ingresos del mes</div><div class="metric-value">${{INCOME}}</div></div>
      <div class="card"><div class="metric-label">Tasa de asistencia</div><div class="metric-value">{{RATE}}%</div></div>
      <div class="card"><div class="metric-label">Paquetes 10 clases</div><div class="metric-value">{{PACKAGES}}</div></div>
    </section>

    <section class="card">
      <h2>Asistencia del día</h2>
      <p id="roster-counts" class="metric-label"></p>
      <form id="roster-form">
        <table>
          <thead><tr><th></th><th>Nombre</th><th>Clase</th><th>Membresía</th></tr></thead>
          <tbody id="roster"></tbody>
        </table>
        <p><button type="submit">Guardar asistencia</button></p>
      </form>
      <p id="status" class="status"></p>
    </section>

    <section class="card">
      <h2>Alertas de inasistencia</h2>
      <table>
        <thead><tr><th>Nombre</th><th>Días sin asistir</th><th>Última asistencia</th><th>Membresía</th><th></th></tr></thead>
        <tbody id="alerts"></tbody>
      </table>
    </section>
  </main>

  <script>
    const date = document.getElementById('date').textContent.trim();
    const rosterEl = document.getElementById('roster');
    const alertsEl = document.getElementById('alerts');
    const statusEl = document.getElementById('status');

    const setStatus = (message, kind) => {
      statusEl.textContent = message;
      statusEl.className = `status ${kind || ''}`;
    };

    const text = (value) => {
      const span = document.createElement('span');
      span.textContent = value == null ? '' : String(value);
      return span.innerHTML;
    };

    const badge = (membership) =>
      `<span class="badge ${membership.urgency}">${text(membership.status)}</span>`;

    const loadRoster = async () => {
      const res = await fetch(`/api/roster?date=${date}`);
      if (!res.ok) {
        throw new Error(await res.text());
      }
      const roster = await res.json();
      document.getElementById('roster-counts').textContent =
        `Presentes: ${roster.present} · Pendientes: ${roster.pending}`;
      rosterEl.innerHTML = roster.members
        .map((entry) => `
          <tr>
            <td><input type="checkbox" name="present" value="${entry.id}"
              ${entry.present ? 'checked' : ''} ${entry.locked ? 'disabled' : ''} /></td>
            <td>${text(entry.name)}</td>
            <td>${text(entry.class_time)}</td>
            <td>${badge(entry.membership)}</td>
          </tr>`)
        .join('');
    };

    const reminderLink = async (id) => {
      const res = await fetch(`/api/members/${id}/reminder?kind=absence`);
      return res.ok ? (await res.json()).url : null;
    };

    const loadAlerts = async () => {
      const res = await fetch('/api/reports/absences');
      if (!res.ok) {
        throw new Error(await res.text());
      }
      const alerts = await res.json();
      if (!alerts.length) {
        alertsEl.innerHTML = '<tr><td colspan="5">Sin alertas</td></tr>';
        return;
      }
      const links = await Promise.all(alerts.map((alert) => reminderLink(alert.id)));
      alertsEl.innerHTML = alerts
        .map((alert, index) => `
          <tr>
            <td>${text(alert.name)}</td>
            <td>${alert.longest_streak}</td>
            <td>${text(alert.last_attendance || 'Nunca')}</td>
            <td>${badge(alert.membership)}</td>
            <td>${links[index] ? `<a href="${links[index]}" target="_blank" rel="noopener">WhatsApp</a>` : ''}</td>
          </tr>`)
        .join('');
    };

    document.getElementById('roster-form').addEventListener('submit', async (event) => {
      event.preventDefault();
      const present = [...rosterEl.querySelectorAll('input[name=present]:checked')]
        .map((input) => Number(input.value));
      setStatus('Guardando...');
      try {
        const res = await fetch('/api/attendance/day', {
          method: 'POST',
          headers: { 'content-type': 'application/json' },
          body: JSON.stringify({ date, present })
        });
        if (!res.ok) {
          throw new Error(await res.text());
        }
        const outcome = await res.json();
        setStatus(`Asistencia guardada: ${outcome.saved} usuarios`);
        await Promise.all([loadRoster(), loadAlerts()]);
      } catch (err) {
        setStatus(err.message, 'error');
      }
    });

    Promise.all([loadRoster(), loadAlerts()]).catch((err) => setStatus(err.message, 'error'));
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn index_fills_placeholders() {
        let summary = Summary {
            active_members: 12,
            monthly_income: Decimal::new(960_000, 0),
            attendance_rate: 41,
            package_members: 2,
            total_members: 14,
            attendance_records: 0,
            payment_records: 0,
            last_backup: None,
        };
        let html = render_index("Box <23>", "2024-01-15", &summary);
        assert!(html.contains("<h1>Box &lt;23&gt;</h1>"));
        assert!(html.contains("$960.000"));
        assert!(html.contains(">41%<"));
        assert!(!html.contains("{{"));
    }
}
